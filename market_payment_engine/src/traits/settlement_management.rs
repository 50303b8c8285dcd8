use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Settlement, SettlementId, SettlementLine, SettlementStatus},
    traits::NewSettlement,
};

/// Storage primitives for the settlement batch. The uniqueness of `(order, vendor)` across all settlements is
/// enforced here, which is what makes batch runs over overlapping periods safe to repeat.
#[allow(async_fn_in_trait)]
pub trait SettlementManagement {
    /// Fetches the per-vendor gross contribution of every order that is paid, completed, created inside the
    /// period, and not yet referenced by a settlement for that vendor.
    async fn fetch_settleable_lines(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<SettlementLine>, SettlementError>;

    /// Persists a settlement for one vendor. Lines whose order was settled by a concurrent run are dropped and
    /// the totals recomputed from the survivors; if nothing survives, no settlement is created and `None` is
    /// returned.
    async fn insert_settlement(&self, settlement: NewSettlement) -> Result<Option<Settlement>, SettlementError>;

    async fn fetch_settlement(
        &self,
        settlement_id: &SettlementId,
    ) -> Result<Option<(Settlement, Vec<SettlementLine>)>, SettlementError>;

    /// Moves a settlement along its payout track: Pending -> Processing -> Paid | Failed. Re-applying the
    /// current status is an idempotent no-op.
    async fn update_settlement_status(
        &self,
        settlement_id: &SettlementId,
        new_status: SettlementStatus,
    ) -> Result<Settlement, SettlementError>;
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested settlement {0} does not exist")]
    SettlementNotFound(SettlementId),
    #[error("Settlement status cannot move from {from} to {to}")]
    InvalidStatusChange { from: SettlementStatus, to: SettlementStatus },
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
