#![forbid(unsafe_code)]

pub mod codec;
pub mod keys;
pub mod mirror;
pub mod repository;
pub mod sqlite;

pub use mirror::{LocalMirror, MirrorError};
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
