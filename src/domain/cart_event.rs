//! Domain events reflecting cart state mutations.
//!
//! Every committed change emits a [`CartEvent`] through the
//! [`super::EventBus`]. Events are delivered to in-process observers and
//! forwarded to WebSocket clients.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cart_state::CartChange;
use super::{CartItem, ProductId};

/// Domain event emitted after every committed cart mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CartEvent {
    /// Emitted when the cart is (re)loaded from storage.
    CartLoaded {
        /// Number of entries restored.
        item_count: usize,
        /// Revision after the load.
        revision: u64,
        /// Load timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a product enters the cart.
    ItemAdded {
        /// The new entry.
        item: CartItem,
        /// Revision after the change.
        revision: u64,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an entry's quantity goes up or down.
    QuantityChanged {
        /// Affected product.
        product_id: ProductId,
        /// Quantity after the change.
        quantity: u32,
        /// Revision after the change.
        revision: u64,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an entry leaves the cart.
    ItemRemoved {
        /// Removed product.
        product_id: ProductId,
        /// Revision after the change.
        revision: u64,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl CartEvent {
    /// Builds the event for a committed [`CartChange`], or `None` for a
    /// no-op.
    #[must_use]
    pub fn from_change(change: CartChange, revision: u64) -> Option<Self> {
        let timestamp = Utc::now();
        match change {
            CartChange::Added(item) => Some(Self::ItemAdded {
                item,
                revision,
                timestamp,
            }),
            CartChange::QuantityChanged {
                product_id,
                quantity,
            } => Some(Self::QuantityChanged {
                product_id,
                quantity,
                revision,
                timestamp,
            }),
            CartChange::Removed(product_id) => Some(Self::ItemRemoved {
                product_id,
                revision,
                timestamp,
            }),
            CartChange::Unchanged => None,
        }
    }

    /// Returns the cart revision this event brings observers to.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        match self {
            Self::CartLoaded { revision, .. }
            | Self::ItemAdded { revision, .. }
            | Self::QuantityChanged { revision, .. }
            | Self::ItemRemoved { revision, .. } => *revision,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::CartLoaded { .. } => "cart_loaded",
            Self::ItemAdded { .. } => "item_added",
            Self::QuantityChanged { .. } => "quantity_changed",
            Self::ItemRemoved { .. } => "item_removed",
        }
    }
}
