//! Cart store: owns the committed cart, persists it, and emits events.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};

use super::persister::{BackgroundPersister, PersistMode, RetryPolicy, write_with_retry};
use crate::config::CartConfig;
use crate::domain::{
    CartChange, CartEvent, CartItem, CartSnapshot, CartState, EventBus, Product, ProductId,
};
use crate::error::CartError;
use crate::persistence::{DEFAULT_CART_KEY, KeyValueStore};

/// Settings that shape a [`CartStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Persistence key the serialized cart lives under.
    pub storage_key: String,
    /// Whether mutations await their write.
    pub persist_mode: PersistMode,
    /// Backoff for failed writes.
    pub retry: RetryPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_CART_KEY.to_string(),
            persist_mode: PersistMode::Durable,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&CartConfig> for StoreOptions {
    fn from(config: &CartConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            persist_mode: config.persist_mode,
            retry: config.retry_policy(),
        }
    }
}

#[derive(Debug)]
enum CartWriter {
    Durable(RetryPolicy),
    Background(BackgroundPersister),
}

/// The single owner of cart contents.
///
/// Every mutation follows the pattern: lock the committed state → compute
/// the next state from it → write the full serialized cart → commit → emit
/// the event → return a snapshot. Holding the lock for the whole sequence
/// means each mutation sees the latest committed cart, so two mutations
/// issued back to back can never both start from the same stale copy.
///
/// # Write modes
///
/// - [`PersistMode::Durable`]: the write is awaited with retry before
///   committing; if it ultimately fails the committed cart is unchanged and
///   the error is returned. Write and commit run on their own task, so a
///   caller that stops waiting (a request timeout, a dropped `select!`
///   branch) cannot leave storage ahead of memory.
/// - [`PersistMode::Background`]: the mutation commits at once and the
///   write is handed to a [`BackgroundPersister`].
#[derive(Debug)]
pub struct CartStore {
    state: Arc<Mutex<CartState>>,
    storage: Arc<dyn KeyValueStore>,
    storage_key: String,
    event_bus: EventBus,
    writer: CartWriter,
}

impl CartStore {
    /// Creates the store and loads the persisted cart into it.
    pub async fn open(
        storage: Arc<dyn KeyValueStore>,
        event_bus: EventBus,
        options: StoreOptions,
    ) -> Self {
        let writer = match options.persist_mode {
            PersistMode::Durable => CartWriter::Durable(options.retry),
            PersistMode::Background => CartWriter::Background(BackgroundPersister::spawn(
                Arc::clone(&storage),
                options.storage_key.clone(),
                options.retry,
            )),
        };
        let store = Self {
            state: Arc::new(Mutex::new(CartState::new())),
            storage,
            storage_key: options.storage_key,
            event_bus,
            writer,
        };
        store.load().await;
        store
    }

    /// Replaces the in-memory cart with the persisted one.
    ///
    /// A missing blob, an unreadable backend, or a blob that does not parse
    /// as a valid cart all leave the cart empty. The blob itself is left
    /// untouched in storage until the next mutation overwrites it.
    pub async fn load(&self) -> CartSnapshot {
        let mut state = self.state.lock().await;
        let key = self.storage_key.as_str();

        let loaded = match self.storage.get(key).await {
            Ok(Some(blob)) => CartState::from_json(&blob).unwrap_or_else(|err| {
                tracing::warn!(key, error = %err, "discarding unreadable cart; starting empty");
                CartState::new()
            }),
            Ok(None) => {
                tracing::debug!(key, "no persisted cart; starting empty");
                CartState::new()
            }
            Err(err) => {
                tracing::warn!(
                    key,
                    backend = self.storage.backend_name(),
                    error = %err,
                    "cart storage unreadable; starting empty"
                );
                CartState::new()
            }
        };

        state.replace_with(loaded);
        let snapshot = state.snapshot();
        self.event_bus.publish(CartEvent::CartLoaded {
            item_count: snapshot.products.len(),
            revision: snapshot.revision,
            timestamp: Utc::now(),
        });
        drop(state);

        tracing::info!(
            items = snapshot.products.len(),
            revision = snapshot.revision,
            "cart loaded"
        );
        snapshot
    }

    /// Adds one unit of `product`, appending it with quantity 1 if it is
    /// not in the cart yet.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidRequest`] for an unusable price, or
    /// [`CartError::Persistence`] if a durable write fails.
    pub async fn add_to_cart(&self, product: Product) -> Result<CartSnapshot, CartError> {
        product.validate()?;
        let product_id = product.id.clone();
        let snapshot = self.mutate("add_to_cart", |state| state.add(product)).await?;
        tracing::info!(%product_id, revision = snapshot.revision, "product added to cart");
        Ok(snapshot)
    }

    /// Adds one unit to the entry for `id`. Unknown ids leave the cart as
    /// it is.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Persistence`] if a durable write fails.
    pub async fn increment(&self, id: &ProductId) -> Result<CartSnapshot, CartError> {
        self.mutate("increment", |state| state.increment(id)).await
    }

    /// Removes one unit from the entry for `id`, removing the entry when
    /// its quantity would reach zero. Unknown ids leave the cart as it is.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Persistence`] if a durable write fails.
    pub async fn decrement(&self, id: &ProductId) -> Result<CartSnapshot, CartError> {
        self.mutate("decrement", |state| state.decrement(id)).await
    }

    /// Current entries.
    pub async fn products(&self) -> Vec<CartItem> {
        self.state.lock().await.items().to_vec()
    }

    /// Current entries with revision and totals.
    pub async fn snapshot(&self) -> CartSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Receiver for every future [`CartEvent`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.event_bus.subscribe()
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Persistence key of this cart.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Waits for outstanding background writes. Returns at once in durable
    /// mode, where nothing is ever outstanding.
    pub async fn flush(&self) {
        if let CartWriter::Background(persister) = &self.writer {
            persister.flush().await;
        }
    }

    async fn mutate<F>(&self, op: &'static str, apply: F) -> Result<CartSnapshot, CartError>
    where
        F: FnOnce(&mut CartState) -> CartChange,
    {
        let state = Arc::clone(&self.state).lock_owned().await;

        let mut next = state.clone();
        let change = apply(&mut next);
        let json = next.to_json()?;

        match &self.writer {
            CartWriter::Durable(policy) => {
                let storage = Arc::clone(&self.storage);
                let key = self.storage_key.clone();
                let event_bus = self.event_bus.clone();
                let policy = *policy;
                let task = tokio::spawn(async move {
                    write_with_retry(storage.as_ref(), &key, &json, &policy)
                        .await
                        .inspect_err(|err| {
                            tracing::error!(op, error = %err, "cart write failed; mutation rolled back");
                        })?;
                    Ok::<_, CartError>(commit(state, next, change, &event_bus, op))
                });
                task.await.map_err(|err| {
                    CartError::Internal(format!("cart write task failed: {err}"))
                })?
            }
            CartWriter::Background(persister) => {
                persister.submit(next.revision(), json);
                Ok(commit(state, next, change, &self.event_bus, op))
            }
        }
    }
}

/// Installs `next` as the committed cart and publishes the event for
/// `change` before the lock is released.
fn commit(
    mut state: OwnedMutexGuard<CartState>,
    next: CartState,
    change: CartChange,
    event_bus: &EventBus,
    op: &'static str,
) -> CartSnapshot {
    *state = next;
    let snapshot = state.snapshot();

    if change.is_change() {
        tracing::debug!(op, revision = snapshot.revision, "cart mutation committed");
    } else {
        tracing::debug!(op, "cart mutation was a no-op");
    }
    if let Some(event) = CartEvent::from_change(change, snapshot.revision) {
        event_bus.publish(event);
    }
    drop(state);

    snapshot
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::persistence::MemoryStore;

    const KEY: &str = "@goMarket:Products";

    /// Memory store whose first `failures` writes fail.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failures: AtomicU32,
        fail_reads: bool,
        writes: AtomicU32,
    }

    impl FlakyStore {
        fn failing_writes(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CartError> {
            if self.fail_reads {
                return Err(CartError::Persistence("read refused".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), CartError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(CartError::Persistence("write refused".to_string()));
            }
            self.inner.set(key, value).await
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Memory store that applies each write at once but acknowledges it
    /// only after `ack_delay`.
    #[derive(Debug)]
    struct SlowAckStore {
        inner: MemoryStore,
        ack_delay: Duration,
    }

    #[async_trait]
    impl KeyValueStore for SlowAckStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CartError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), CartError> {
            self.inner.set(key, value).await?;
            tokio::time::sleep(self.ack_delay).await;
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "slow-ack"
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn options(persist_mode: PersistMode, retry: RetryPolicy) -> StoreOptions {
        StoreOptions {
            storage_key: KEY.to_string(),
            persist_mode,
            retry,
        }
    }

    fn id(s: &str) -> ProductId {
        let Ok(id) = ProductId::new(s) else {
            panic!("valid id");
        };
        id
    }

    fn product(s: &str, price: f64) -> Product {
        Product {
            id: id(s),
            title: format!("Product {s}"),
            image_url: format!("https://img.example/{s}.png"),
            price,
        }
    }

    async fn open_durable(storage: Arc<dyn KeyValueStore>) -> CartStore {
        CartStore::open(
            storage,
            EventBus::new(64),
            options(PersistMode::Durable, fast_retry(0)),
        )
        .await
    }

    async fn persisted(storage: &dyn KeyValueStore) -> CartState {
        let Ok(Some(blob)) = storage.get(KEY).await else {
            panic!("expected persisted cart");
        };
        let Ok(state) = CartState::from_json(&blob) else {
            panic!("persisted cart does not parse");
        };
        state
    }

    #[tokio::test]
    async fn open_without_persisted_cart_is_empty() {
        let store = open_durable(Arc::new(MemoryStore::new())).await;
        assert!(store.products().await.is_empty());
    }

    #[tokio::test]
    async fn open_restores_persisted_cart() {
        let blob = r#"[{"id":"A","title":"a","image_url":"u","price":10.0,"quantity":2}]"#;
        let store = open_durable(Arc::new(MemoryStore::with_entry(KEY, blob))).await;
        let products = store.products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].quantity, 2);
    }

    #[tokio::test]
    async fn corrupt_cart_loads_empty_and_is_left_in_storage() {
        let storage = Arc::new(MemoryStore::with_entry(KEY, "{not json"));
        let store = open_durable(Arc::clone(&storage) as Arc<dyn KeyValueStore>).await;
        assert!(store.products().await.is_empty());
        let Ok(Some(blob)) = storage.get(KEY).await else {
            panic!("blob should remain");
        };
        assert_eq!(blob, "{not json");
    }

    #[tokio::test]
    async fn unreadable_backend_loads_empty() {
        let storage = Arc::new(FlakyStore {
            fail_reads: true,
            ..FlakyStore::default()
        });
        let store = open_durable(storage).await;
        assert!(store.products().await.is_empty());
    }

    #[tokio::test]
    async fn every_mutation_writes_the_full_cart() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = open_durable(Arc::clone(&storage)).await;

        let _ = store.add_to_cart(product("A", 10.0)).await;
        let _ = store.add_to_cart(product("B", 4.0)).await;
        let _ = store.increment(&id("A")).await;

        let saved = persisted(storage.as_ref()).await;
        assert_eq!(saved.items(), store.products().await.as_slice());
    }

    #[tokio::test]
    async fn scenario_add_add_decrement_decrement() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = open_durable(Arc::clone(&storage)).await;

        let Ok(snap) = store.add_to_cart(product("A", 10.0)).await else {
            panic!("add failed");
        };
        assert_eq!(snap.products.len(), 1);
        assert_eq!(snap.products[0].quantity, 1);

        let Ok(snap) = store.add_to_cart(product("A", 10.0)).await else {
            panic!("add failed");
        };
        assert_eq!(snap.products.len(), 1);
        assert_eq!(snap.products[0].quantity, 2);

        let Ok(snap) = store.decrement(&id("A")).await else {
            panic!("decrement failed");
        };
        assert_eq!(snap.products[0].quantity, 1);

        let Ok(snap) = store.decrement(&id("A")).await else {
            panic!("decrement failed");
        };
        assert!(snap.products.is_empty());
        assert!(persisted(storage.as_ref()).await.is_empty());
    }

    #[tokio::test]
    async fn absent_id_changes_nothing_and_emits_nothing() {
        let store = open_durable(Arc::new(MemoryStore::new())).await;
        let _ = store.add_to_cart(product("A", 10.0)).await;
        let before = store.snapshot().await;
        let mut rx = store.subscribe();

        let Ok(after) = store.increment(&id("missing")).await else {
            panic!("increment failed");
        };
        let _ = store.decrement(&id("missing")).await;

        assert_eq!(after, before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_price_is_rejected_without_writing() {
        let storage = Arc::new(FlakyStore::default());
        let store = open_durable(Arc::clone(&storage) as Arc<dyn KeyValueStore>).await;
        let result = store.add_to_cart(product("A", f64::NAN)).await;
        assert!(matches!(result, Err(CartError::InvalidRequest(_))));
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn durable_failure_rolls_back() {
        let storage = Arc::new(FlakyStore::failing_writes(u32::MAX));
        let store = CartStore::open(
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
            EventBus::new(16),
            options(PersistMode::Durable, fast_retry(2)),
        )
        .await;

        let result = store.add_to_cart(product("A", 10.0)).await;
        assert!(matches!(result, Err(CartError::Persistence(_))));
        assert!(store.products().await.is_empty());
        assert_eq!(storage.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_failures_within_budget_succeed() {
        let storage = Arc::new(FlakyStore::failing_writes(2));
        let store = CartStore::open(
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
            EventBus::new(16),
            options(PersistMode::Durable, fast_retry(3)),
        )
        .await;

        let result = store.add_to_cart(product("A", 10.0)).await;
        assert!(result.is_ok());
        assert_eq!(store.products().await.len(), 1);
        assert_eq!(persisted(storage.as_ref()).await.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_durable_write_still_commits() {
        let storage = Arc::new(SlowAckStore {
            inner: MemoryStore::new(),
            ack_delay: Duration::from_millis(200),
        });
        let store = open_durable(Arc::clone(&storage) as Arc<dyn KeyValueStore>).await;

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            store.add_to_cart(product("A", 10.0)),
        )
        .await;
        assert!(outcome.is_err());

        // Waits behind the in-flight write for the lock.
        let products = store.products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(persisted(storage.as_ref()).await.items(), products.as_slice());

        let Ok(snap) = store.increment(&id("A")).await else {
            panic!("increment failed");
        };
        assert_eq!(snap.products[0].quantity, 2);
        assert_eq!(persisted(storage.as_ref()).await.items(), snap.products.as_slice());
    }

    #[tokio::test]
    async fn concurrent_increments_are_never_lost() {
        let store = Arc::new(open_durable(Arc::new(MemoryStore::new())).await);
        let _ = store.add_to_cart(product("A", 1.0)).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.increment(&id("A")).await }));
        }
        for handle in handles {
            let Ok(Ok(_)) = handle.await else {
                panic!("increment task failed");
            };
        }

        let products = store.products().await;
        assert_eq!(products[0].quantity, 33);
    }

    #[tokio::test]
    async fn mutations_publish_events_in_revision_order() {
        let store = open_durable(Arc::new(MemoryStore::new())).await;
        let mut rx = store.subscribe();

        let _ = store.add_to_cart(product("A", 10.0)).await;
        let _ = store.increment(&id("A")).await;
        let _ = store.decrement(&id("A")).await;
        let _ = store.decrement(&id("A")).await;

        let mut kinds = Vec::new();
        let mut last_revision = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(event.revision() > last_revision);
            last_revision = event.revision();
            kinds.push(event.event_type_str());
        }
        assert_eq!(
            kinds,
            ["item_added", "quantity_changed", "quantity_changed", "item_removed"]
        );
    }

    #[tokio::test]
    async fn background_mode_commits_first_and_persists_on_flush() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = CartStore::open(
            Arc::clone(&storage),
            EventBus::new(16),
            options(PersistMode::Background, fast_retry(1)),
        )
        .await;

        for _ in 0..5 {
            let _ = store.add_to_cart(product("A", 10.0)).await;
        }
        let _ = store.add_to_cart(product("B", 1.0)).await;
        store.flush().await;

        let saved = persisted(storage.as_ref()).await;
        assert_eq!(saved.items(), store.products().await.as_slice());
        assert_eq!(saved.get(&id("A")).map(|item| item.quantity), Some(5));
    }

    #[tokio::test]
    async fn reload_after_restart_sees_previous_session() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let store = open_durable(Arc::clone(&storage)).await;
            let _ = store.add_to_cart(product("A", 10.0)).await;
            let _ = store.add_to_cart(product("A", 10.0)).await;
        }
        let store = open_durable(storage).await;
        let products = store.products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].quantity, 2);
    }
}
