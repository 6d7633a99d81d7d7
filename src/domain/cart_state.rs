//! In-memory cart contents and the pure mutations over them.
//!
//! [`CartState`] knows nothing about storage or notification. Each mutation
//! rewrites the sequence in place and reports what changed as a
//! [`CartChange`], which the store turns into events and persistence writes.

use std::collections::HashSet;

use serde::Serialize;

use super::cart_item::{CartItem, CartSummary, Product};
use super::ProductId;
use crate::error::CartError;

/// Outcome of a single cart mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CartChange {
    /// A new entry was appended with quantity 1.
    Added(CartItem),
    /// An existing entry's quantity changed.
    QuantityChanged {
        /// Affected product.
        product_id: ProductId,
        /// Quantity after the change.
        quantity: u32,
    },
    /// An entry was removed because its quantity reached zero.
    Removed(ProductId),
    /// The sequence was left as it was.
    Unchanged,
}

impl CartChange {
    /// Returns `true` if the mutation altered the sequence.
    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Point-in-time copy of the cart handed to views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSnapshot {
    /// Entries in insertion order.
    pub products: Vec<CartItem>,
    /// Revision the copy was taken at.
    pub revision: u64,
    /// Totals over `products`.
    pub summary: CartSummary,
}

/// Ordered sequence of cart entries, unique by product id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    items: Vec<CartItem>,
    revision: u64,
}

impl CartState {
    /// Creates an empty cart at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from previously persisted entries.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidRequest`] if two entries share an id or
    /// any entry has a quantity of zero.
    pub fn from_items(items: Vec<CartItem>) -> Result<Self, CartError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.quantity == 0 {
                return Err(CartError::InvalidRequest(format!(
                    "entry {} has quantity 0",
                    item.id
                )));
            }
            if !seen.insert(&item.id) {
                return Err(CartError::InvalidRequest(format!(
                    "duplicate entry {}",
                    item.id
                )));
            }
        }
        Ok(Self { items, revision: 0 })
    }

    /// Parses the persisted JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Serialization`] if the blob is not a JSON array
    /// of entries, or [`CartError::InvalidRequest`] if it breaks the cart
    /// invariants.
    pub fn from_json(json: &str) -> Result<Self, CartError> {
        let items: Vec<CartItem> = serde_json::from_str(json)?;
        Self::from_items(items)
    }

    /// Serializes the entries to the persisted JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, CartError> {
        Ok(serde_json::to_string(&self.items)?)
    }

    /// Current entries in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of changing mutations applied since construction.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Looks up the entry for `id`.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Number of distinct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the cart holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Totals over the current entries.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::of(&self.items)
    }

    /// Copies the current entries for a view.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            products: self.items.clone(),
            revision: self.revision,
            summary: self.summary(),
        }
    }

    /// Adds one unit of `product`: increments an existing entry, or appends
    /// a new one with quantity 1.
    pub fn add(&mut self, product: Product) -> CartChange {
        if self.get(&product.id).is_some() {
            return self.increment(&product.id);
        }
        let item = CartItem::from_product(product);
        self.items.push(item.clone());
        self.bump();
        CartChange::Added(item)
    }

    /// Adds one unit to the entry for `id`. Absent ids and quantities
    /// already at `u32::MAX` leave the cart untouched.
    pub fn increment(&mut self, id: &ProductId) -> CartChange {
        let Some(item) = self.items.iter_mut().find(|item| &item.id == id) else {
            return CartChange::Unchanged;
        };
        let Some(quantity) = item.quantity.checked_add(1) else {
            return CartChange::Unchanged;
        };
        item.quantity = quantity;
        self.bump();
        CartChange::QuantityChanged {
            product_id: id.clone(),
            quantity,
        }
    }

    /// Removes one unit from the entry for `id`, dropping the entry when its
    /// last unit goes. Absent ids leave the cart untouched.
    pub fn decrement(&mut self, id: &ProductId) -> CartChange {
        let Some(pos) = self.items.iter().position(|item| &item.id == id) else {
            return CartChange::Unchanged;
        };
        let Some(item) = self.items.get_mut(pos) else {
            return CartChange::Unchanged;
        };
        if item.quantity <= 1 {
            self.items.remove(pos);
            self.bump();
            return CartChange::Removed(id.clone());
        }
        item.quantity -= 1;
        let quantity = item.quantity;
        self.bump();
        CartChange::QuantityChanged {
            product_id: id.clone(),
            quantity,
        }
    }

    /// Replaces the entries wholesale, keeping the revision monotonic.
    pub(crate) fn replace_with(&mut self, loaded: Self) {
        self.items = loaded.items;
        self.bump();
    }

    fn bump(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}
