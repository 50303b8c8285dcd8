//! Unified API for cart access.

use std::fmt::Debug;

use crate::{
    db_types::{Cart, CartItem},
    traits::{CartError, CartManagement},
};

/// The `CartApi` provides a unified API for reading and mutating buyer carts.
pub struct CartApi<B> {
    db: B,
}

impl<B: Debug> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi ({:?})", self.db)
    }
}

impl<B> CartApi<B>
where B: CartManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Adds the item to the buyer's cart. Quantities of an already-present sku are summed and the new unit price
    /// snapshot replaces the old one. Rejects non-positive quantities.
    pub async fn add_item(&self, buyer_id: &str, item: CartItem) -> Result<Cart, CartError> {
        if item.quantity <= 0 {
            return Err(CartError::InvalidQuantity(item.quantity));
        }
        self.db.upsert_cart_item(buyer_id, item).await
    }

    /// Removes the sku from the buyer's cart. Removing an absent sku is a no-op.
    pub async fn remove_item(&self, buyer_id: &str, sku: &str) -> Result<Cart, CartError> {
        self.db.remove_cart_item(buyer_id, sku).await
    }

    /// Fetches the buyer's cart. A buyer who has never added anything gets the empty shape, not an error.
    pub async fn cart(&self, buyer_id: &str) -> Result<Cart, CartError> {
        self.db.fetch_cart(buyer_id).await
    }
}
