//! Type-safe product identifier.
//!
//! [`ProductId`] is a newtype wrapper around the catalog's string id so that
//! product identifiers cannot be confused with titles, URLs or storage keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CartError;

/// Identifier of a catalog product, unique within a cart.
///
/// Ids come from the product catalog and are opaque to the cart. The only
/// constraint enforced here is that an id is never empty, both when built
/// directly and when deserialized from persisted data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Creates a `ProductId` from any string-like value.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidProductId`] if the id is empty or
    /// whitespace only.
    pub fn new(id: impl Into<String>) -> Result<Self, CartError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CartError::InvalidProductId(id));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProductId {
    type Error = CartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
