//! NIP-01 event record and REQ filter.

use serde::{Deserialize, Serialize};

use crate::PublicKey;

/// Kind of the profile metadata event (NIP-01 kind 0).
pub const KIND_METADATA: u32 = 0;

/// A raw event as delivered by a relay.
///
/// Only `kind`, `pubkey` and `content` are required on the wire. The other
/// fields default when a relay omits them. `pubkey` stays a raw string here;
/// validation happens when the event is decoded into a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event id (hex sha256)
    #[serde(default)]
    pub id: String,
    /// Author public key (hex)
    pub pubkey: String,
    /// Unix timestamp (seconds) claimed by the author
    #[serde(default)]
    pub created_at: u64,
    /// Event kind
    pub kind: u32,
    /// Tag arrays
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    /// Serialized content; for kind 0 a JSON object
    pub content: String,
    /// Schnorr signature (not verified here)
    #[serde(default)]
    pub sig: String,
}

impl Event {
    /// Build a minimal metadata event (used by mock relays and tests).
    pub fn metadata(pubkey: &PublicKey, content: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: String::new(),
            pubkey: pubkey.to_string(),
            created_at,
            kind: KIND_METADATA,
            tags: Vec::new(),
            content: content.into(),
            sig: String::new(),
        }
    }
}

/// Filter for a REQ subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Event kinds to match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    /// Authors to match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<PublicKey>,
}

impl Filter {
    /// Kind-0 filter for the given authors.
    pub fn profiles<'a>(authors: impl IntoIterator<Item = &'a PublicKey>) -> Self {
        Self {
            kinds: vec![KIND_METADATA],
            authors: authors.into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> PublicKey {
        PublicKey::parse(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn profile_filter_json_shape() {
        let filter = Filter::profiles([&key('a'), &key('b')]);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kinds": [0],
                "authors": ["a".repeat(64), "b".repeat(64)],
            })
        );
    }

    #[test]
    fn empty_filter_fields_are_omitted() {
        let json = serde_json::to_string(&Filter::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn event_optional_fields_default() {
        let json = format!(
            r#"{{"kind":0,"pubkey":"{}","content":"{{}}"}}"#,
            "a".repeat(64)
        );
        let event: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.kind, KIND_METADATA);
        assert_eq!(event.created_at, 0);
        assert!(event.tags.is_empty());
        assert!(event.id.is_empty());
    }

    #[test]
    fn event_requires_content() {
        let json = format!(r#"{{"kind":0,"pubkey":"{}"}}"#, "a".repeat(64));
        assert!(serde_json::from_str::<Event>(&json).is_err());
    }
}
