//! Identity and subscription types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::TypesError;

/// Length of a hex-encoded public key (32 bytes).
pub const PUBLIC_KEY_HEX_LEN: usize = 64;

/// Number of characters shown when a key stands in for a display name.
const SHORT_LEN: usize = 8;

/// A Nostr identity key.
///
/// 32 bytes displayed as 64 lowercase hex characters. Parsing accepts
/// either case and normalises to lowercase so map lookups are stable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

impl PublicKey {
    /// Parse a hex public key.
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        if input.len() != PUBLIC_KEY_HEX_LEN || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypesError::InvalidPublicKey(input.to_string()));
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    /// The full lowercase hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, used in logs and as a display-name fallback.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl TryFrom<String> for PublicKey {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for PublicKey {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

/// Identifier of one REQ subscription on one relay connection.
///
/// Generated locally: unix milliseconds plus a random suffix, so two
/// subscriptions opened in the same millisecond still differ.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Wrap an existing identifier (e.g. one echoed back by a relay).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        static FALLBACK: AtomicU64 = AtomicU64::new(0);

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut salt = [0u8; 4];
        if getrandom::getrandom(&mut salt).is_err() {
            salt = (FALLBACK.fetch_add(1, Ordering::Relaxed) as u32).to_be_bytes();
        }
        Self(format!("profile-sub-{}-{}", millis, hex::encode(salt)))
    }

    /// The identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234";

    #[test]
    fn parse_valid_key() {
        let key = PublicKey::parse(ALICE).unwrap();
        assert_eq!(key.as_str(), ALICE);
        assert_eq!(key.short(), "abcd1234");
    }

    #[test]
    fn parse_normalises_case() {
        let key = PublicKey::parse(&ALICE.to_ascii_uppercase()).unwrap();
        assert_eq!(key.as_str(), ALICE);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(matches!(
            PublicKey::parse("abcd1234"),
            Err(TypesError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn parse_rejects_non_hex() {
        let bad = format!("{}zz", &ALICE[..62]);
        assert!(PublicKey::parse(&bad).is_err());
    }

    #[test]
    fn key_serializes_as_plain_string() {
        let key = PublicKey::parse(ALICE).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", ALICE));

        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn key_deserialize_validates() {
        let result: Result<PublicKey, _> = serde_json::from_str("\"not-a-key\"");
        assert!(result.is_err());
    }

    #[test]
    fn key_debug_is_short() {
        let key = PublicKey::parse(ALICE).unwrap();
        assert_eq!(format!("{:?}", key), "PublicKey(abcd1234)");
    }

    #[test]
    fn generated_subscription_ids_differ() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("profile-sub-"));
    }
}
