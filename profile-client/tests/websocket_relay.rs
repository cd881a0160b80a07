//! End-to-end tests against a local WebSocket relay.

use futures_util::{SinkExt, StreamExt};
use nostr_profile_client::{
    ProfileResolver, ResolverConfig, SharedProfileStore, WebSocketFactory,
};
use profile_core::FailoverOutcome;
use profile_types::{ClientMessage, Event, PublicKey, RelayMessage};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn key(c: char) -> PublicKey {
    PublicKey::parse(&c.to_string().repeat(64)).unwrap()
}

/// Spawn a relay on a free port. `answers` decides whether REQs get events.
async fn spawn_relay(answers: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let Ok(ClientMessage::Req {
                        subscription_id,
                        filters,
                    }) = ClientMessage::from_json(&text)
                    else {
                        continue;
                    };
                    if !answers {
                        continue;
                    }
                    for author in filters.iter().flat_map(|f| f.authors.iter()) {
                        let content = format!(r#"{{"name":"ws-{}"}}"#, author.short());
                        let frame = RelayMessage::Event {
                            subscription_id: subscription_id.clone(),
                            event: Event::metadata(author, content, 1_700_000_000),
                        };
                        let _ = ws.send(Message::Text(frame.to_json().unwrap())).await;
                    }
                    let eose = RelayMessage::EndOfStoredEvents { subscription_id };
                    let _ = ws.send(Message::Text(eose.to_json().unwrap())).await;
                }
            });
        }
    });

    format!("ws://{}", addr)
}

#[tokio::test]
async fn resolves_profiles_over_websocket() {
    let relay = spawn_relay(true).await;
    let config = ResolverConfig::default().with_relays([relay.clone()]);
    let resolver = ProfileResolver::new(config, WebSocketFactory);
    let store = SharedProfileStore::default();
    let (a, b) = (key('a'), key('b'));

    let report = resolver.resolve([&a, &b], &store, || {}).await;

    assert_eq!(report.outcome, FailoverOutcome::Resolved);
    assert_eq!(report.relays_attempted, vec![relay]);
    let store = store.lock().unwrap();
    assert_eq!(store.display_name(&a), "ws-aaaaaaaa");
    assert_eq!(store.display_name(&b), "ws-bbbbbbbb");
    assert_eq!(store.get_stored(&a).unwrap().created_at, Some(1_700_000_000));
}

#[tokio::test]
async fn fails_over_from_dead_relay_to_live_one() {
    // Bind then drop a listener to get a port nothing listens on
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("ws://{}", listener.local_addr().unwrap())
    };
    let live = spawn_relay(true).await;
    let config = ResolverConfig::default().with_relays([dead.clone(), live.clone()]);
    let resolver = ProfileResolver::new(config, WebSocketFactory);
    let store = SharedProfileStore::default();

    let report = resolver.resolve([&key('c')], &store, || {}).await;

    assert_eq!(report.outcome, FailoverOutcome::Resolved);
    assert_eq!(report.relays_attempted, vec![dead, live]);
    assert!(store.lock().unwrap().contains(&key('c')));
}

#[tokio::test]
async fn silent_relay_times_out_and_releases() {
    let relay = spawn_relay(false).await;
    let config = ResolverConfig::default()
        .with_relays([relay])
        .with_response_timeout(1);
    let resolver = ProfileResolver::new(config, WebSocketFactory);
    let store = SharedProfileStore::default();

    let report = resolver.resolve([&key('d')], &store, || {}).await;

    assert_eq!(report.outcome, FailoverOutcome::Exhausted);
    assert!(report.unresolved.contains(&key('d')));
    assert!(!resolver.is_in_flight(&key('d')));
    assert!(store.lock().unwrap().is_empty());
}

/// A `wss://` URL whose listener accepts TCP but never completes a TLS handshake.
async fn spawn_plain_tcp() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    format!("wss://{}", addr)
}

#[tokio::test]
async fn failed_tls_handshake_fails_over() {
    let broken = spawn_plain_tcp().await;
    let live = spawn_relay(true).await;
    let config = ResolverConfig::default().with_relays([broken.clone(), live.clone()]);
    let resolver = ProfileResolver::new(config, WebSocketFactory);
    let store = SharedProfileStore::default();

    let report = resolver.resolve([&key('e')], &store, || {}).await;

    assert_eq!(report.outcome, FailoverOutcome::Resolved);
    assert_eq!(report.relays_attempted, vec![broken, live]);
    assert_eq!(store.lock().unwrap().display_name(&key('e')), "ws-eeeeeeee");
}

#[tokio::test]
async fn background_fetch_over_tls_releases_key() {
    let relay = spawn_plain_tcp().await;
    let config = ResolverConfig::default().with_relays([relay]);
    let resolver = ProfileResolver::new(config, WebSocketFactory);
    let store = SharedProfileStore::default();
    let k = key('f');

    resolver.fetch_profiles([&k], &store, || {});
    assert!(resolver.is_in_flight(&k));

    let mut waited = Duration::ZERO;
    while resolver.is_in_flight(&k) && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    assert!(!resolver.is_in_flight(&k));
    assert!(store.lock().unwrap().is_empty());
}
