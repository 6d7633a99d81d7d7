//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::context::CartProvider;
use crate::domain::EventBus;
use crate::service::CartStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The cart every handler reads and mutates.
    pub cart: Arc<CartStore>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state around an opened store, sharing its event bus.
    #[must_use]
    pub fn new(cart: Arc<CartStore>) -> Self {
        let event_bus = cart.event_bus().clone();
        Self { cart, event_bus }
    }

    /// Provider that scopes WebSocket sessions to this cart.
    #[must_use]
    pub fn provider(&self) -> CartProvider {
        CartProvider::new(Arc::clone(&self.cart))
    }
}
