use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, OrderItem},
    mpe_api::order_objects::{OrderQueryFilter, OrderSearchResult},
};

/// Read-side queries over orders. All search results are ordered by the stable key `(created_at, id)` so that
/// pagination stays consistent while new orders are being inserted concurrently.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderQueryError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`, along with the total number of
    /// matches (ignoring pagination).
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<OrderSearchResult, OrderQueryError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderQueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for OrderQueryError {
    fn from(e: sqlx::Error) -> Self {
        OrderQueryError::DatabaseError(e.to_string())
    }
}
