//! # profile-client
//!
//! Relay failover client for resolving Nostr profiles.
//!
//! This is the library applications use to fill a profile cache from relays.
//!
//! ## Features
//!
//! - **Deduplication**: a key is requested by at most one fetch at a time
//! - **Relay Failover**: unresolved keys move down an ordered relay list
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Pure State Machine**: Uses profile-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use profile_client::{ProfileResolver, ResolverConfig, SharedProfileStore, WebSocketFactory};
//!
//! let resolver = ProfileResolver::new(ResolverConfig::default(), WebSocketFactory);
//! let store = SharedProfileStore::default();
//!
//! let report = resolver.resolve(&keys, &store, || {}).await;
//! println!("{} resolved", report.resolved.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod resolver;
pub mod transport;

pub use config::{ConfigError, ResolverConfig, DEFAULT_RELAYS};
pub use resolver::{FetchReport, ProfileResolver, SharedProfileStore};
pub use transport::{
    MockFrame, MockRelay, MockRelayNetwork, MockTransport, Transport, TransportError,
    TransportFactory, WebSocketFactory, WebSocketTransport,
};
