use thiserror::Error;

use crate::traits::{CartError, MarketError, OrderQueryError, SettlementError};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Could not encode value: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<SqliteDatabaseError> for CartError {
    fn from(e: SqliteDatabaseError) -> Self {
        CartError::DatabaseError(e.to_string())
    }
}

impl From<SqliteDatabaseError> for OrderQueryError {
    fn from(e: SqliteDatabaseError) -> Self {
        OrderQueryError::DatabaseError(e.to_string())
    }
}

impl From<SqliteDatabaseError> for MarketError {
    fn from(e: SqliteDatabaseError) -> Self {
        MarketError::DatabaseError(e.to_string())
    }
}

impl From<SqliteDatabaseError> for SettlementError {
    fn from(e: SqliteDatabaseError) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
