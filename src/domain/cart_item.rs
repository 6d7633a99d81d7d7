//! Cart line items and the catalog product they are built from.

use serde::{Deserialize, Serialize};

use super::ProductId;
use crate::error::CartError;

/// A catalog product as handed to `add_to_cart`: a cart entry without a
/// quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Product image location.
    pub image_url: String,
    /// Unit price.
    pub price: f64,
}

impl Product {
    /// Checks that the product can enter the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidRequest`] if the price is negative, NaN
    /// or infinite.
    pub fn validate(&self) -> Result<(), CartError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CartError::InvalidRequest(format!(
                "invalid price for product {}: must be a finite, non-negative number",
                self.id
            )));
        }
        Ok(())
    }
}

/// One line of the cart: a product plus how many units of it are held.
///
/// The serialized form is the persisted wire format:
/// `{"id", "title", "image_url", "price", "quantity"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog identifier, unique within the cart.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Product image location.
    pub image_url: String,
    /// Unit price.
    pub price: f64,
    /// Units held. Always at least 1 while the entry is in the cart.
    pub quantity: u32,
}

impl CartItem {
    /// Builds a fresh entry for `product` with a quantity of 1.
    #[must_use]
    pub fn from_product(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            image_url: product.image_url,
            price: product.price,
            quantity: 1,
        }
    }

    /// Line total: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Aggregates derived from the cart contents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CartSummary {
    /// Sum of all quantities.
    pub total_items: u64,
    /// Sum of all line totals.
    pub total_price: f64,
}

impl CartSummary {
    /// Computes the summary for a sequence of entries.
    #[must_use]
    pub fn of(items: &[CartItem]) -> Self {
        items.iter().fold(Self::default(), |acc, item| Self {
            total_items: acc.total_items + u64::from(item.quantity),
            total_price: acc.total_price + item.line_total(),
        })
    }
}
