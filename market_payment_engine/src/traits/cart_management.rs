use thiserror::Error;

use crate::db_types::{Cart, CartItem};

/// Per-buyer cart storage. Carts are created lazily on the first add and are never shared across buyers.
#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// Adds the item to the buyer's cart. If the sku is already present, the quantities are summed and the most
    /// recent unit price snapshot wins. The updated cart (with recomputed subtotal) is returned.
    async fn upsert_cart_item(&self, buyer_id: &str, item: CartItem) -> Result<Cart, CartError>;

    /// Removes the sku from the buyer's cart. Removing an absent sku is a no-op, not an error.
    async fn remove_cart_item(&self, buyer_id: &str, sku: &str) -> Result<Cart, CartError>;

    /// Fetches the buyer's cart. Never fails on absence: a buyer without a cart gets the empty shape.
    async fn fetch_cart(&self, buyer_id: &str) -> Result<Cart, CartError>;
}

#[derive(Debug, Clone, Error)]
pub enum CartError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        CartError::DatabaseError(e.to_string())
    }
}
