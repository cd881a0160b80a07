//! Resolve profiles for public keys.

use anyhow::{Context, Result};
use profile_client::{
    FetchReport, MockRelay, MockRelayNetwork, ProfileResolver, ResolverConfig,
    SharedProfileStore, TransportFactory, WebSocketFactory,
};
use profile_types::PublicKey;
use serde_json::{Map, Value};

/// Run the fetch command.
pub async fn run(config: ResolverConfig, pubkeys: &[String], json: bool, use_mock: bool) -> Result<()> {
    let keys = parse_keys(pubkeys)?;

    if use_mock {
        let network = mock_network(&config);
        do_fetch(ProfileResolver::new(config, network), &keys, json).await
    } else {
        do_fetch(ProfileResolver::new(config, WebSocketFactory), &keys, json).await
    }
}

fn parse_keys(pubkeys: &[String]) -> Result<Vec<PublicKey>> {
    let mut keys: Vec<PublicKey> = Vec::with_capacity(pubkeys.len());
    for raw in pubkeys {
        let key =
            PublicKey::parse(raw).with_context(|| format!("Invalid public key: {}", raw))?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Mock network whose primary relay answers every key (for testing/demo).
fn mock_network(config: &ResolverConfig) -> MockRelayNetwork {
    let network = MockRelayNetwork::new();
    if let Some(primary) = config.relays.first() {
        network.set_relay(primary.as_str(), MockRelay::AnswerAll);
    }
    network
}

async fn do_fetch<F: TransportFactory>(
    resolver: ProfileResolver<F>,
    keys: &[PublicKey],
    json: bool,
) -> Result<()> {
    let store = SharedProfileStore::default();
    let report = resolver.resolve(keys, &store, || {}).await;

    let store = store
        .lock()
        .map_err(|_| anyhow::anyhow!("Profile store lock poisoned"))?;

    if json {
        let mut out = Map::new();
        for key in store.keys() {
            if let Some(profile) = store.get(key) {
                out.insert(key.to_string(), serde_json::to_value(profile)?);
            }
        }
        println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
    } else {
        for key in keys {
            println!("{}  {}", key.short(), store.display_name(key));
        }
    }

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &FetchReport) {
    if report.unresolved.is_empty() {
        return;
    }
    eprintln!(
        "{} of {} profiles not found on {} relay(s)",
        report.unresolved.len(),
        report.claimed.len(),
        report.relays_attempted.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys_dedups_and_normalises() {
        let lower = "ab".repeat(32);
        let upper = lower.to_uppercase();
        let keys = parse_keys(&[lower.clone(), upper]).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].as_str(), lower);
    }

    #[test]
    fn parse_keys_rejects_garbage() {
        let err = parse_keys(&["npub1xyz".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Invalid public key"));
    }

    #[tokio::test]
    async fn mock_fetch_resolves_every_key() {
        let config = ResolverConfig::default();
        let network = mock_network(&config);
        let resolver = ProfileResolver::new(config, network.clone());
        let keys = parse_keys(&["cd".repeat(32)]).unwrap();
        let store = SharedProfileStore::default();

        let report = resolver.resolve(&keys, &store, || {}).await;

        assert!(report.unresolved.is_empty());
        assert_eq!(network.connections(), vec!["wss://relay.nostr.band"]);
        assert_eq!(
            store.lock().unwrap().display_name(&keys[0]),
            "mock-cdcdcdcd"
        );
    }
}
