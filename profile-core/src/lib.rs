//! # profile-core
//!
//! Pure logic for Nostr profile resolution (no I/O, instant tests).
//!
//! This crate implements the profile cache, the in-flight reservation set,
//! the kind-0 decoder and the relay failover state machine without any
//! network I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about failover transitions
//!
//! The actual I/O (relay connections, timers) is performed by `profile-client`,
//! which interprets the actions produced by the failover state machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod state;
pub mod store;
pub mod tracker;

pub use decoder::{decode_profile, DecodeError, DecodedProfile};
pub use state::{FailoverAction, FailoverEvent, FailoverOutcome, FailoverState};
pub use store::{Profile, ProfileStore, RecencyPolicy, StoredProfile};
pub use tracker::InFlightTracker;
