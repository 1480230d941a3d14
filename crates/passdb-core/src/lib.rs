//! passdb-core: encrypted-at-rest key-value store for the passdb password
//! manager.
//!
//! # Layers
//! - [`crypto`]: Argon2id key derivation and the XChaCha20-Poly1305 envelope.
//! - [`document`]: the in-memory name/version/data document and its CRUD.
//! - [`store`]: create/load/save of a document over byte streams.
//! - [`db`]: the file-backed item database and its atomic commit.
//!
//! A store is owned by a single process and thread; nothing here locks the
//! file against concurrent writers.

pub mod active;
pub mod config;
pub mod crypto;
pub mod db;
pub mod document;
pub mod error;
pub mod item;
pub mod paths;
pub mod store;

pub use config::StoreOptions;
pub use crypto::KdfParams;
pub use db::PassDb;
pub use document::Document;
pub use error::{CryptoError, DbError, ItemError, StoreError};
pub use item::Item;
pub use store::Store;
