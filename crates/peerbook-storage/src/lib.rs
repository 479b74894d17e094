//! # Peerbook Storage
//!
//! Peer store persistence for peerbook.
//!
//! This crate maps what a node knows about its peers (identity and public
//! key, multiaddresses, supported protocols, signed peer records, free-form
//! metadata) onto five record shapes stored through a pluggable engine, and
//! assembles them back into composite peer views.
//!
//! ## Features
//!
//! - **StorageEngine trait**: Ordered key/value contract the store runs on
//! - **InMemoryEngine**: In-memory implementation for testing/simulation
//! - **RedbEngine**: redb-backed implementation for production
//! - **PeerRepository**: Address, key, protocol, record and metadata books
//! - **RetentionPolicy**: Caps signed records kept per peer
//! - **build_view**: Concurrent assembly of a [`PeerView`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use peerbook_core::{Multiaddr, PeerId};
//! use peerbook_storage::{InMemoryEngine, PeerRepository, PeerStoreConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Arc::new(InMemoryEngine::new());
//!     let store = PeerRepository::open(engine, PeerStoreConfig::default())
//!         .await
//!         .unwrap();
//!
//!     let peer = PeerId::random();
//!     let address: Multiaddr = "/ip4/1.2.3.4/tcp/4001".parse().unwrap();
//!
//!     // The peer is created on first add
//!     store.add_address(&peer, &address).await.unwrap();
//!     store.add_address(&peer, &address).await.unwrap();
//!
//!     assert_eq!(store.addresses(&peer).await.unwrap(), vec![address]);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod repository;
pub mod retention;
pub mod schema;
pub mod view;

// Re-exports
pub use config::{PeerStoreConfig, PeerStoreConfigBuilder};
pub use engine::{
    InMemoryEngine, RedbEngine, RedbEngineConfig, StorageEngine, Table, WriteBatch, WriteOp,
};
pub use error::StorageError;
pub use repository::{PeerRepository, Resolution, TrimSummary};
pub use retention::{DEFAULT_MAX_RECORDS_PER_PEER, RetentionPolicy};
pub use schema::{Migration, Migrator, PeerEntry, StoreId};
pub use view::{PeerInfo, PeerView, build_simple_view, build_view};
