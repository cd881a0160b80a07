//! Profile cache keyed by public key.
//!
//! The store is plain data: lookups and writes, nothing else. Notifying the
//! application about new profiles is the resolver's job.

use std::collections::HashMap;

use profile_types::PublicKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decoder::DecodedProfile;

/// An open profile record.
///
/// Arbitrary string-keyed JSON fields; only `name` has a defined meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    /// Wrap parsed content fields.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Display name, if present as a non-empty string.
    pub fn name(&self) -> Option<&str> {
        self.0
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Look up any field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A profile together with the timestamp of the event it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    /// The profile record.
    pub profile: Profile,
    /// `created_at` of the source event; `None` when set directly.
    pub created_at: Option<u64>,
}

/// How an incoming profile event competes with a stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecencyPolicy {
    /// Every accepted event overwrites, regardless of timestamp.
    #[default]
    LastWriteWins,
    /// Events older than the stored profile are skipped.
    NewestWins,
}

/// Mapping from public key to its latest known profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: HashMap<PublicKey, StoredProfile>,
}

impl ProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile for a key.
    pub fn get(&self, key: &PublicKey) -> Option<&Profile> {
        self.profiles.get(key).map(|stored| &stored.profile)
    }

    /// Profile for a key plus its source timestamp.
    pub fn get_stored(&self, key: &PublicKey) -> Option<&StoredProfile> {
        self.profiles.get(key)
    }

    /// Overwrite the profile for a key. No merge.
    pub fn set(&mut self, key: PublicKey, profile: Profile) {
        self.profiles.insert(
            key,
            StoredProfile {
                profile,
                created_at: None,
            },
        );
    }

    /// Write a decoded profile under the given policy.
    ///
    /// Returns `true` if the store changed.
    pub fn apply(&mut self, decoded: DecodedProfile, policy: RecencyPolicy) -> bool {
        if policy == RecencyPolicy::NewestWins {
            let stored_at = self
                .profiles
                .get(&decoded.pubkey)
                .and_then(|stored| stored.created_at);
            if matches!(stored_at, Some(at) if decoded.created_at < at) {
                return false;
            }
        }
        self.profiles.insert(
            decoded.pubkey,
            StoredProfile {
                profile: decoded.profile,
                created_at: Some(decoded.created_at),
            },
        );
        true
    }

    /// Whether a profile is stored for the key.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.profiles.contains_key(key)
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Keys with a stored profile.
    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.profiles.keys()
    }

    /// Name to show for a key: the profile name, else the short key.
    pub fn display_name(&self, key: &PublicKey) -> String {
        self.get(key)
            .and_then(Profile::name)
            .unwrap_or_else(|| key.short())
            .to_string()
    }
}
