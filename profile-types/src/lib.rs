//! # profile-types
//!
//! Wire format types for resolving Nostr profiles (kind-0 metadata) from relays.
//!
//! This crate provides the foundational types used across all profile crates:
//! - [`PublicKey`], [`SubscriptionId`] - Identity and subscription types
//! - [`Event`], [`Filter`] - NIP-01 event record and REQ filter
//! - [`ClientMessage`], [`RelayMessage`] - The consumed subset of the relay protocol
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod ids;
mod messages;

pub use error::TypesError;
pub use event::{Event, Filter, KIND_METADATA};
pub use ids::{PublicKey, SubscriptionId, PUBLIC_KEY_HEX_LEN};
pub use messages::{ClientMessage, RelayMessage};
