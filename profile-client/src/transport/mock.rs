//! Mock transport for testing.
//!
//! [`MockTransport`] on its own allows queueing frames and capturing sent
//! messages for verification. Created through a [`MockRelayNetwork`], it
//! instead plays a scripted relay chosen by the URL it connects to.

use super::{Transport, TransportError, TransportFactory};
use async_trait::async_trait;
use profile_types::{ClientMessage, Event, PublicKey, RelayMessage, SubscriptionId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted relay behaviour.
#[derive(Debug, Clone)]
pub enum MockRelay {
    /// `connect()` fails with this message.
    Refuse(String),
    /// Accepts the connection and the REQ, then never answers.
    Silent,
    /// Answers a REQ with these frames, then holds the connection open.
    Respond(Vec<MockFrame>),
    /// Answers every requested author with a profile named `mock-<short key>`, then EOSE.
    AnswerAll,
    /// Accepts the connection, then every `send()` fails with this message.
    FailSend(String),
    /// `connect()` never completes.
    HangConnect,
    /// Like [`MockRelay::Silent`], and `close()` never completes either.
    Unresponsive,
}

/// One scripted frame, bound to the subscription id of the REQ it answers.
#[derive(Debug, Clone)]
pub enum MockFrame {
    /// `["EVENT", <sub>, event]`
    Event(Event),
    /// `["EOSE", <sub>]`
    Eose,
    /// Sent verbatim.
    Raw(String),
    /// Relay drops the connection.
    Close,
}

impl MockFrame {
    /// Metadata event frame for a key with the given content.
    pub fn profile(pubkey: &PublicKey, content: &str) -> Self {
        Self::Event(Event::metadata(pubkey, content, 0))
    }
}

#[derive(Debug)]
enum Inbound {
    Frame(String),
    Close,
}

/// Mock transport for testing.
///
/// Allows queueing responses and capturing sent messages for verification.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    notify: Arc<Notify>,
    network: Option<MockRelayNetwork>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    relay: Option<MockRelay>,
    sent_messages: Vec<String>,
    receive_queue: VecDeque<Inbound>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn on_network(network: MockRelayNetwork) -> Self {
        Self {
            network: Some(network),
            ..Self::default()
        }
    }

    /// Queue a frame to be returned by the next `recv()` call.
    pub fn queue_response(&self, text: impl Into<String>) {
        lock(&self.inner)
            .receive_queue
            .push_back(Inbound::Frame(text.into()));
        self.notify.notify_one();
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<String> {
        lock(&self.inner).sent_messages.clone()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<String> {
        lock(&self.inner).sent_messages.last().cloned()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        lock(&self.inner).connected_address.clone()
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
            network: self.network.clone(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let relay = match &self.network {
            Some(network) => Some(network.open(address)?),
            None => None,
        };

        if matches!(relay, Some(MockRelay::HangConnect)) {
            return std::future::pending().await;
        }

        let mut inner = lock(&self.inner);
        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        inner.relay = relay;
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let address = {
            let mut inner = lock(&self.inner);

            if !inner.connected {
                return Err(TransportError::NotConnected);
            }

            if let Some(MockRelay::FailSend(error)) = &inner.relay {
                return Err(TransportError::SendFailed(error.clone()));
            }

            inner.sent_messages.push(text.to_string());

            let frames = match (&inner.relay, ClientMessage::from_json(text)) {
                (
                    Some(relay),
                    Ok(ClientMessage::Req {
                        subscription_id,
                        filters,
                    }),
                ) => {
                    let authors: Vec<PublicKey> =
                        filters.into_iter().flat_map(|f| f.authors).collect();
                    script(relay, &subscription_id, &authors)
                }
                _ => Vec::new(),
            };
            inner.receive_queue.extend(frames);
            inner.connected_address.clone()
        };

        if let (Some(network), Some(address)) = (&self.network, address) {
            network.record_sent(&address, text);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        loop {
            {
                let mut inner = lock(&self.inner);

                if !inner.connected {
                    return Err(TransportError::NotConnected);
                }

                match inner.receive_queue.pop_front() {
                    Some(Inbound::Frame(text)) => return Ok(text),
                    Some(Inbound::Close) => {
                        inner.connected = false;
                        return Err(TransportError::ConnectionClosed);
                    }
                    // A scripted relay keeps the connection open
                    None if inner.relay.is_some() => {}
                    None => return Err(TransportError::ConnectionClosed),
                }
            }
            self.notify.notified().await;
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let hangs = matches!(lock(&self.inner).relay, Some(MockRelay::Unresponsive));
        if hangs {
            return std::future::pending().await;
        }
        lock(&self.inner).connected = false;
        self.notify.notify_one();
        Ok(())
    }
}

fn script(relay: &MockRelay, subscription_id: &SubscriptionId, authors: &[PublicKey]) -> Vec<Inbound> {
    let frames = match relay {
        MockRelay::Refuse(_)
        | MockRelay::Silent
        | MockRelay::FailSend(_)
        | MockRelay::HangConnect
        | MockRelay::Unresponsive => Vec::new(),
        MockRelay::Respond(frames) => frames.clone(),
        MockRelay::AnswerAll => authors
            .iter()
            .map(|key| {
                let content = serde_json::json!({ "name": format!("mock-{}", key.short()) });
                MockFrame::profile(key, &content.to_string())
            })
            .chain(std::iter::once(MockFrame::Eose))
            .collect(),
    };

    frames
        .into_iter()
        .filter_map(|frame| {
            let message = match frame {
                MockFrame::Event(event) => RelayMessage::Event {
                    subscription_id: subscription_id.clone(),
                    event,
                },
                MockFrame::Eose => RelayMessage::EndOfStoredEvents {
                    subscription_id: subscription_id.clone(),
                },
                MockFrame::Raw(text) => return Some(Inbound::Frame(text)),
                MockFrame::Close => return Some(Inbound::Close),
            };
            message.to_json().ok().map(Inbound::Frame)
        })
        .collect()
}

/// A set of scripted relays keyed by URL.
///
/// Acts as a [`TransportFactory`]: every transport it creates plays the relay
/// registered for the URL it connects to, and records the connection attempt.
#[derive(Debug, Clone, Default)]
pub struct MockRelayNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

#[derive(Debug, Default)]
struct NetworkInner {
    relays: HashMap<String, MockRelay>,
    connections: Vec<String>,
    sent: Vec<(String, String)>,
}

impl MockRelayNetwork {
    /// Create an empty network. Unknown URLs refuse connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a relay, builder style.
    pub fn with_relay(self, url: impl Into<String>, relay: MockRelay) -> Self {
        self.set_relay(url, relay);
        self
    }

    /// Register (or replace) a relay.
    pub fn set_relay(&self, url: impl Into<String>, relay: MockRelay) {
        lock(&self.inner).relays.insert(url.into(), relay);
    }

    /// Every connection attempt, in order, including refused ones.
    pub fn connections(&self) -> Vec<String> {
        lock(&self.inner).connections.clone()
    }

    /// Frames sent to a relay, in order.
    pub fn sent_to(&self, url: &str) -> Vec<String> {
        lock(&self.inner)
            .sent
            .iter()
            .filter(|(to, _)| to == url)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Frames sent to a relay, parsed.
    pub fn requests_to(&self, url: &str) -> Vec<ClientMessage> {
        self.sent_to(url)
            .iter()
            .filter_map(|text| ClientMessage::from_json(text).ok())
            .collect()
    }

    fn open(&self, url: &str) -> Result<MockRelay, TransportError> {
        let mut inner = lock(&self.inner);
        inner.connections.push(url.to_string());
        match inner.relays.get(url) {
            Some(MockRelay::Refuse(error)) => Err(TransportError::ConnectionFailed(error.clone())),
            Some(relay) => Ok(relay.clone()),
            None => Err(TransportError::ConnectionFailed(format!(
                "unknown relay: {}",
                url
            ))),
        }
    }

    fn record_sent(&self, url: &str, text: &str) {
        lock(&self.inner)
            .sent
            .push((url.to_string(), text.to_string()));
    }
}

impl TransportFactory for MockRelayNetwork {
    type Transport = MockTransport;

    fn create(&self) -> MockTransport {
        MockTransport::on_network(self.clone())
    }
}
