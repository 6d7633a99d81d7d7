//! Cart DTOs for the read and mutation endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CartItem, CartSnapshot, Product, ProductId};
use crate::error::CartError;

/// Request body for `POST /cart/items`: a product without a quantity.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AddToCartRequest {
    /// Catalog product id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Product image location.
    pub image_url: String,
    /// Unit price.
    pub price: f64,
}

impl TryFrom<AddToCartRequest> for Product {
    type Error = CartError;

    fn try_from(req: AddToCartRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(req.id)?,
            title: req.title,
            image_url: req.image_url,
            price: req.price,
        })
    }
}

/// One cart entry as returned to views.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemDto {
    /// Catalog product id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Product image location.
    pub image_url: String,
    /// Unit price.
    pub price: f64,
    /// Units in the cart (at least 1).
    pub quantity: u32,
    /// `price × quantity`.
    pub line_total: f64,
}

impl From<CartItem> for CartItemDto {
    fn from(item: CartItem) -> Self {
        let line_total = item.line_total();
        Self {
            id: item.id.into(),
            title: item.title,
            image_url: item.image_url,
            price: item.price,
            quantity: item.quantity,
            line_total,
        }
    }
}

/// Response body for every cart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    /// Entries in insertion order.
    pub products: Vec<CartItemDto>,
    /// Sum of all quantities.
    pub total_items: u64,
    /// Sum of all line totals.
    pub total_price: f64,
    /// Cart revision the response reflects.
    pub revision: u64,
}

impl From<CartSnapshot> for CartResponse {
    fn from(snapshot: CartSnapshot) -> Self {
        Self {
            products: snapshot.products.into_iter().map(CartItemDto::from).collect(),
            total_items: snapshot.summary.total_items,
            total_price: snapshot.summary.total_price,
            revision: snapshot.revision,
        }
    }
}
