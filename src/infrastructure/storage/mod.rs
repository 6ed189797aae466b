//! Persistent key-value storage
//!
//! `KeyValueStore` is the only type the rest of the crate touches. It sits on
//! top of a `StorageBackend` (browser `localStorage`, a JSON file or memory)
//! and never propagates backend failures: they are logged and degrade to a
//! no-op.

pub mod kv_store;
pub mod memory;

#[cfg(not(target_arch = "wasm32"))]
pub mod file;

#[cfg(target_arch = "wasm32")]
pub mod local_storage;

pub use kv_store::{KeyValueStore, SharedBackend, StorageBackend, share};
pub use memory::MemoryBackend;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileBackend;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageBackend;
