//! Kind-0 event decoding.
//!
//! Turns a raw relay [`Event`] into a `(public key, profile)` pair. Decoding
//! is a pure function; failures are reported to the caller, which logs and
//! discards the event.

use profile_types::{Event, PublicKey, TypesError, KIND_METADATA};
use serde_json::Value;
use thiserror::Error;

use crate::store::Profile;

/// Reasons an event cannot become a profile.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Event is not a metadata event.
    #[error("not a profile event: kind {kind}")]
    InvalidKind {
        /// The kind that was received.
        kind: u32,
    },

    /// Author key is not a valid public key.
    #[error("invalid author: {0}")]
    InvalidPublicKey(#[from] TypesError),

    /// Content is not a JSON object.
    #[error("malformed profile content: {0}")]
    MalformedContent(String),
}

/// A successfully decoded profile event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedProfile {
    /// Author of the profile.
    pub pubkey: PublicKey,
    /// Parsed content.
    pub profile: Profile,
    /// Author-claimed timestamp of the event.
    pub created_at: u64,
}

/// Decode a kind-0 event.
pub fn decode_profile(event: &Event) -> Result<DecodedProfile, DecodeError> {
    if event.kind != KIND_METADATA {
        return Err(DecodeError::InvalidKind { kind: event.kind });
    }
    let pubkey = PublicKey::parse(&event.pubkey)?;
    let fields = match serde_json::from_str::<Value>(&event.content) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            return Err(DecodeError::MalformedContent(
                "content is not a JSON object".into(),
            ))
        }
        Err(e) => return Err(DecodeError::MalformedContent(e.to_string())),
    };
    Ok(DecodedProfile {
        pubkey,
        profile: Profile::new(fields),
        created_at: event.created_at,
    })
}
