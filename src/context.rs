//! Ambient cart access for code running inside a provider scope.
//!
//! [`CartProvider::scope`] installs a cart handle for the duration of a
//! future; [`use_cart`] resolves it from anywhere inside that future and
//! fails fast outside it. Code that already holds a handle should keep
//! passing it explicitly.

use std::future::Future;
use std::sync::Arc;

use crate::error::CartError;
use crate::service::CartStore;

tokio::task_local! {
    static CURRENT_CART: Arc<CartStore>;
}

/// Installs a cart handle for a task.
#[derive(Debug, Clone)]
pub struct CartProvider {
    store: Arc<CartStore>,
}

impl CartProvider {
    /// Wraps a store so it can be provided to futures.
    #[must_use]
    pub fn new(store: Arc<CartStore>) -> Self {
        Self { store }
    }

    /// The provided store.
    #[must_use]
    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    /// Runs `fut` with this provider's cart available through
    /// [`use_cart`].
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_CART.scope(Arc::clone(&self.store), fut).await
    }
}

/// Returns the cart provided to the current task.
///
/// # Errors
///
/// Returns [`CartError::OutsideProvider`] when called outside
/// [`CartProvider::scope`].
pub fn use_cart() -> Result<Arc<CartStore>, CartError> {
    CURRENT_CART
        .try_with(Arc::clone)
        .map_err(|_| CartError::OutsideProvider)
}
