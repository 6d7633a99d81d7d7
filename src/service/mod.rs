//! Service layer: the cart store and its write path.
//!
//! [`CartStore`] serializes every mutation over the latest committed cart,
//! persists the result through a [`crate::persistence::KeyValueStore`], and
//! emits events through the [`super::domain::EventBus`].

pub mod cart_store;
pub mod persister;

pub use cart_store::{CartStore, StoreOptions};
pub use persister::{BackgroundPersister, PersistMode, RetryPolicy, write_with_retry};
