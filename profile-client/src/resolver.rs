//! ProfileResolver - deduplicated profile fetching with relay failover.
//!
//! This module provides [`ProfileResolver`], the primary API for applications
//! to fill a shared [`ProfileStore`] from an ordered list of relays.
//!
//! # Architecture
//!
//! ProfileResolver uses a pure state machine (from profile-core) for the
//! failover logic and interprets the actions to perform actual I/O via the
//! Transport trait.
//!
//! ```text
//! Application → ProfileResolver → Transport → Relay
//!                     ↓
//!               profile-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use profile_client::{ProfileResolver, ResolverConfig, WebSocketFactory};
//!
//! let resolver = ProfileResolver::new(ResolverConfig::default(), WebSocketFactory);
//! let store = SharedProfileStore::default();
//!
//! // Returns immediately; `redraw` runs once per profile that arrives
//! resolver.fetch_profiles(&keys, &store, redraw);
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use profile_core::{
    decode_profile, FailoverAction, FailoverEvent, FailoverOutcome, FailoverState,
    InFlightTracker, ProfileStore,
};
use profile_types::{ClientMessage, Event, Filter, PublicKey, RelayMessage, SubscriptionId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::transport::{Transport, TransportFactory};

/// Profile store shared between the application and running fetches.
pub type SharedProfileStore = Arc<Mutex<ProfileStore>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Summary of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Keys this fetch reserved.
    pub claimed: BTreeSet<PublicKey>,
    /// Claimed keys a relay answered for.
    pub resolved: BTreeSet<PublicKey>,
    /// Claimed keys no relay answered for; released again.
    pub unresolved: BTreeSet<PublicKey>,
    /// Relay URLs tried, in order.
    pub relays_attempted: Vec<String>,
    /// How the fetch ended.
    pub outcome: FailoverOutcome,
}

/// Resolves profiles for public keys from an ordered relay list.
///
/// Cloning is cheap; clones share the in-flight tracker, so a key fetched
/// through one clone is never requested again by another until released.
pub struct ProfileResolver<F: TransportFactory> {
    config: Arc<ResolverConfig>,
    factory: Arc<F>,
    tracker: Arc<Mutex<InFlightTracker>>,
}

impl<F: TransportFactory> Clone for ProfileResolver<F> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            factory: Arc::clone(&self.factory),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<F: TransportFactory> ProfileResolver<F> {
    /// Create a new resolver.
    pub fn new(config: ResolverConfig, factory: F) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            tracker: Arc::new(Mutex::new(InFlightTracker::new())),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Get a reference to the transport factory (for testing).
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Whether a fetch currently owns the key.
    pub fn is_in_flight(&self, key: &PublicKey) -> bool {
        lock(&self.tracker).is_reserved(key)
    }

    /// Fetch profiles in the background.
    ///
    /// Keys already in the store or already being fetched are skipped; the
    /// rest are reserved before this returns. `on_update` runs once for every
    /// profile written to the store.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn fetch_profiles<'a, U>(
        &self,
        keys: impl IntoIterator<Item = &'a PublicKey>,
        store: &SharedProfileStore,
        on_update: U,
    ) where
        U: Fn() + Send + Sync + 'static,
    {
        let claimed = self.claim(keys, store);
        if claimed.is_empty() {
            debug!("Nothing to fetch");
            return;
        }

        let resolver = self.clone();
        let store = Arc::clone(store);
        tokio::spawn(async move {
            resolver.run(claimed, store, on_update).await;
        });
    }

    /// Fetch profiles and wait for the fetch to settle.
    pub async fn resolve<'a, U>(
        &self,
        keys: impl IntoIterator<Item = &'a PublicKey>,
        store: &SharedProfileStore,
        on_update: U,
    ) -> FetchReport
    where
        U: Fn() + Send + Sync,
    {
        let claimed = self.claim(keys, store);
        self.run(claimed, Arc::clone(store), on_update).await
    }

    fn claim<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a PublicKey>,
        store: &SharedProfileStore,
    ) -> BTreeSet<PublicKey> {
        let store = lock(store);
        let mut tracker = lock(&self.tracker);
        tracker.claim(keys, &store)
    }

    async fn run<U>(
        &self,
        claimed: BTreeSet<PublicKey>,
        store: SharedProfileStore,
        on_update: U,
    ) -> FetchReport
    where
        U: Fn() + Send + Sync,
    {
        let mut fetch = Fetch {
            pending: claimed.clone(),
            claimed,
            resolved: BTreeSet::new(),
            relays_attempted: Vec::new(),
            transport: None,
            subscription: None,
            deadline: None,
            close_timeout: self.config.connect_timeout(),
            queue: VecDeque::new(),
            tracker: Arc::clone(&self.tracker),
            settled: false,
        };
        let relay_count = self.config.relays.len();
        let mut state = FailoverState::new();
        fetch.queue.push_back(FailoverEvent::Start {
            pending: fetch.pending.len(),
        });

        while !state.is_settled() {
            let event = match fetch.queue.pop_front() {
                Some(event) => event,
                None => fetch.next_event(self.relay_url(state.relay())).await,
            };
            if matches!(event, FailoverEvent::Closed { .. }) {
                fetch.drop_connection().await;
            }

            let (new_state, actions) = state.on_event(event, relay_count);
            state = new_state;
            for action in actions {
                self.execute(action, &mut fetch, &store, &on_update).await;
            }
        }

        fetch.settled = true;
        let outcome = state.outcome().unwrap_or(FailoverOutcome::Exhausted);
        match outcome {
            FailoverOutcome::NothingToFetch => {}
            FailoverOutcome::Resolved => info!(
                resolved = fetch.resolved.len(),
                relays = fetch.relays_attempted.len(),
                "Profile fetch complete"
            ),
            FailoverOutcome::Exhausted => warn!(
                resolved = fetch.resolved.len(),
                unresolved = fetch.pending.len(),
                "Relay list exhausted"
            ),
        }

        FetchReport {
            claimed: std::mem::take(&mut fetch.claimed),
            resolved: std::mem::take(&mut fetch.resolved),
            unresolved: std::mem::take(&mut fetch.pending),
            relays_attempted: std::mem::take(&mut fetch.relays_attempted),
            outcome,
        }
    }

    fn relay_url(&self, relay: Option<usize>) -> &str {
        relay
            .and_then(|index| self.config.relays.get(index))
            .map_or("-", String::as_str)
    }

    async fn execute<U>(
        &self,
        action: FailoverAction,
        fetch: &mut Fetch<F::Transport>,
        store: &SharedProfileStore,
        on_update: &U,
    ) where
        U: Fn() + Send + Sync,
    {
        match action {
            FailoverAction::Connect { relay } => {
                let url = self.relay_url(Some(relay)).to_string();
                fetch.relays_attempted.push(url.clone());
                let transport = self.factory.create();
                debug!(relay = %url, pending = fetch.pending.len(), "Connecting");

                let error =
                    match tokio::time::timeout(self.config.connect_timeout(), transport.connect(&url))
                        .await
                    {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(_) => Some("connect timed out".to_string()),
                    };
                match error {
                    None => {
                        fetch.transport = Some(transport);
                        fetch.queue.push_back(FailoverEvent::Connected);
                    }
                    Some(error) => {
                        warn!(relay = %url, error = %error, "Relay connection failed");
                        fetch.queue.push_back(FailoverEvent::ConnectFailed {
                            error,
                            pending: fetch.pending.len(),
                        });
                    }
                }
            }

            FailoverAction::Subscribe { relay } => {
                let url = self.relay_url(Some(relay));
                let subscription_id = SubscriptionId::generate();
                let req = ClientMessage::Req {
                    subscription_id: subscription_id.clone(),
                    filters: vec![Filter::profiles(&fetch.pending)],
                };
                debug!(
                    relay = %url,
                    subscription = %subscription_id,
                    authors = fetch.pending.len(),
                    "Sending REQ"
                );
                fetch.subscription = Some(subscription_id);

                let sent = match (req.to_json(), &fetch.transport) {
                    (Ok(text), Some(transport)) => {
                        transport.send(&text).await.map_err(|e| e.to_string())
                    }
                    (Err(e), _) => Err(e.to_string()),
                    (_, None) => Err("no connection".to_string()),
                };
                if let Err(error) = sent {
                    warn!(relay = %url, error = %error, "Failed to send REQ");
                    fetch.queue.push_back(FailoverEvent::Closed {
                        reason: error,
                        pending: fetch.pending.len(),
                    });
                }
            }

            FailoverAction::StartResponseTimer => {
                fetch.deadline = Some(Instant::now() + self.config.response_timeout());
            }

            FailoverAction::CancelResponseTimer => {
                fetch.deadline = None;
            }

            FailoverAction::ProcessEvent { event } => {
                self.accept(event, fetch, store, on_update);
            }

            FailoverAction::Unsubscribe => {
                if let (Some(transport), Some(subscription_id)) =
                    (&fetch.transport, fetch.subscription.take())
                {
                    let close = ClientMessage::Close { subscription_id };
                    if let Ok(text) = close.to_json() {
                        if let Err(e) = transport.send(&text).await {
                            debug!(error = %e, "Failed to send CLOSE");
                        }
                    }
                }
            }

            FailoverAction::Disconnect => {
                fetch.drop_connection().await;
                fetch.queue.push_back(FailoverEvent::Closed {
                    reason: "subscription finished".to_string(),
                    pending: fetch.pending.len(),
                });
            }

            FailoverAction::ReleasePending => {
                let mut tracker = lock(&self.tracker);
                for key in &fetch.pending {
                    tracker.release(key);
                }
            }
        }
    }

    /// Decode an event and write it to the store if this fetch asked for it.
    fn accept<U>(
        &self,
        event: Event,
        fetch: &mut Fetch<F::Transport>,
        store: &SharedProfileStore,
        on_update: &U,
    ) where
        U: Fn() + Send + Sync,
    {
        let decoded = match decode_profile(&event) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Discarding profile event");
                return;
            }
        };
        if !fetch.claimed.contains(&decoded.pubkey) {
            debug!(author = decoded.pubkey.short(), "Discarding profile for unrequested author");
            return;
        }

        let key = decoded.pubkey.clone();
        let changed = {
            let mut store = lock(store);
            let changed = store.apply(decoded, self.config.recency);
            lock(&self.tracker).release(&key);
            changed
        };
        fetch.pending.remove(&key);

        if changed {
            debug!(author = key.short(), "Profile updated");
        } else {
            debug!(author = key.short(), "Skipping stale profile event");
        }
        fetch.resolved.insert(key);
        if changed {
            on_update();
        }
    }
}

/// Mutable state of one running fetch.
///
/// Dropping a fetch that never settled (its task panicked or its future was
/// abandoned) releases whatever it still holds in the tracker.
struct Fetch<T> {
    claimed: BTreeSet<PublicKey>,
    pending: BTreeSet<PublicKey>,
    resolved: BTreeSet<PublicKey>,
    relays_attempted: Vec<String>,
    transport: Option<T>,
    subscription: Option<SubscriptionId>,
    deadline: Option<Instant>,
    close_timeout: Duration,
    queue: VecDeque<FailoverEvent>,
    tracker: Arc<Mutex<InFlightTracker>>,
    settled: bool,
}

impl<T> Drop for Fetch<T> {
    fn drop(&mut self) {
        if self.settled || self.pending.is_empty() {
            return;
        }
        warn!(pending = self.pending.len(), "Fetch abandoned; releasing reservations");
        let mut tracker = lock(&self.tracker);
        for key in &self.pending {
            tracker.release(key);
        }
    }
}

impl<T: Transport> Fetch<T> {
    /// Wait for the next inbound event on the current subscription.
    async fn next_event(&self, relay: &str) -> FailoverEvent {
        let pending = self.pending.len();
        let (Some(transport), Some(subscription)) = (&self.transport, &self.subscription) else {
            return FailoverEvent::Closed {
                reason: "no subscription".to_string(),
                pending,
            };
        };
        let deadline = self.deadline;
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                frame = transport.recv() => {
                    let text = match frame {
                        Ok(text) => text,
                        Err(e) => {
                            info!(relay, reason = %e, "Relay connection closed");
                            return FailoverEvent::Closed {
                                reason: e.to_string(),
                                pending,
                            };
                        }
                    };
                    match RelayMessage::from_json(&text) {
                        Ok(RelayMessage::Event { subscription_id, event })
                            if &subscription_id == subscription =>
                        {
                            return FailoverEvent::EventReceived { event };
                        }
                        Ok(RelayMessage::EndOfStoredEvents { subscription_id })
                            if &subscription_id == subscription =>
                        {
                            debug!(relay, "End of stored events");
                            return FailoverEvent::EndOfStoredEvents;
                        }
                        Ok(RelayMessage::Other { label }) => {
                            debug!(relay, %label, "Ignoring relay message");
                        }
                        Ok(other) => {
                            debug!(
                                relay,
                                subscription = ?other.subscription_id(),
                                "Ignoring message for another subscription"
                            );
                        }
                        Err(e) => {
                            warn!(relay, error = %e, "Ignoring malformed relay frame");
                        }
                    }
                }
                _ = &mut timer => {
                    warn!(relay, "Relay response timed out");
                    return FailoverEvent::TimedOut;
                }
            }
        }
    }

    /// Close and forget the current connection, if any.
    async fn drop_connection(&mut self) {
        self.subscription = None;
        if let Some(transport) = self.transport.take() {
            if transport.is_connected() {
                match tokio::time::timeout(self.close_timeout, transport.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "Error closing relay connection"),
                    Err(_) => debug!("Timed out closing relay connection"),
                }
            }
        }
    }
}
