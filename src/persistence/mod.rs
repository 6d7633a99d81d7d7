//! Persistence layer: string key-value storage for the serialized cart.
//!
//! The [`KeyValueStore`] trait stores raw strings under string keys.
//! Encoding the cart is the store's caller's job, so backends stay free of
//! any knowledge of cart entries. Three backends are provided: an in-process
//! map, a directory of files, and a PostgreSQL table.

pub mod file;
pub mod memory;
pub mod postgres;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CartConfig;
use crate::error::CartError;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Key under which the serialized cart is stored unless configured
/// otherwise.
pub const DEFAULT_CART_KEY: &str = "@goMarket:Products";

/// Async string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Reads the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Persistence`] if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, CartError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Persistence`] if the backend cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), CartError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Which [`KeyValueStore`] implementation to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// [`MemoryStore`]; contents are lost on exit.
    Memory,
    /// [`FileStore`] under the configured data directory.
    File,
    /// [`PostgresStore`] on the configured database.
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(CartError::Config(format!(
                "unknown storage backend {other:?} (expected memory, file or postgres)"
            ))),
        }
    }
}

/// Builds the backend selected by `config`.
///
/// # Errors
///
/// Returns [`CartError::Persistence`] if the data directory cannot be
/// created or the database cannot be reached.
pub async fn connect(config: &CartConfig) -> Result<Arc<dyn KeyValueStore>, CartError> {
    let store: Arc<dyn KeyValueStore> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::open(&config.storage_dir).await?),
        StorageBackend::Postgres => Arc::new(PostgresStore::connect(config).await?),
    };
    tracing::info!(backend = store.backend_name(), "storage backend ready");
    Ok(store)
}
