use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Settlement, SettlementId, SettlementLine, SettlementStatus},
    sqlite::SqliteDatabaseError,
};

const SETTLEMENT_COLUMNS: &str = "id, settlement_id, vendor_code, period_start, period_end, status, gross_amount, \
                                  commission_amount, net_amount, created_at, updated_at";

/// Per-vendor gross contributions of orders that are paid, completed, inside the period, and not yet settled
/// for that vendor.
pub(crate) async fn settleable_lines(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<SettlementLine>, SqliteDatabaseError> {
    let lines = sqlx::query_as::<_, SettlementLine>(
        r#"
        SELECT i.order_id AS order_id, i.vendor_code AS vendor_code, SUM(i.quantity * i.unit_price) AS vendor_gross
        FROM order_items i
        JOIN orders o ON o.order_id = i.order_id
        WHERE o.payment_status = 'Paid'
          AND o.fulfillment_status = 'Completed'
          AND o.created_at >= $1
          AND o.created_at <= $2
          AND NOT EXISTS (
              SELECT 1 FROM settlement_orders so WHERE so.order_id = i.order_id AND so.vendor_code = i.vendor_code
          )
        GROUP BY i.order_id, i.vendor_code
        ORDER BY i.vendor_code ASC, i.order_id ASC
        "#,
    )
    .bind(period_start)
    .bind(period_end)
    .fetch_all(conn)
    .await?;
    trace!("🧾️ {} settleable order-vendor lines in period", lines.len());
    Ok(lines)
}

pub(crate) async fn insert_settlement_row(
    settlement_id: &SettlementId,
    vendor_code: &str,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"
        INSERT INTO settlements (settlement_id, vendor_code, period_start, period_end, gross_amount, commission_amount, net_amount, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 0, 0, 0, $5, $5)
        "#,
    )
    .bind(settlement_id.as_str())
    .bind(vendor_code)
    .bind(period_start)
    .bind(period_end)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Attaches one order-vendor line to the settlement. Returns `false` when the order was already settled for
/// this vendor (the unique index absorbed the insert), in which case the caller excludes it from the totals.
pub(crate) async fn try_attach_line(
    settlement_id: &SettlementId,
    line: &SettlementLine,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO settlement_orders (settlement_id, order_id, vendor_code, vendor_gross) VALUES ($1, $2, $3, $4)",
    )
    .bind(settlement_id.as_str())
    .bind(line.order_id.as_str())
    .bind(&line.vendor_code)
    .bind(line.vendor_gross)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub(crate) async fn update_settlement_totals(
    settlement_id: &SettlementId,
    gross: mpg_common::Money,
    commission: mpg_common::Money,
    net: mpg_common::Money,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        "UPDATE settlements SET gross_amount = $1, commission_amount = $2, net_amount = $3, updated_at = $4 WHERE settlement_id = $5",
    )
    .bind(gross)
    .bind(commission)
    .bind(net)
    .bind(now)
    .bind(settlement_id.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_settlement(
    settlement_id: &SettlementId,
    conn: &mut SqliteConnection,
) -> Result<Option<Settlement>, SqliteDatabaseError> {
    let q = format!("SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE settlement_id = $1");
    match sqlx::query_as::<_, Settlement>(&q).bind(settlement_id.as_str()).fetch_one(conn).await {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(s) => Ok(Some(s)),
    }
}

pub(crate) async fn fetch_settlement_lines(
    settlement_id: &SettlementId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SettlementLine>, SqliteDatabaseError> {
    let lines = sqlx::query_as::<_, SettlementLine>(
        "SELECT order_id, vendor_code, vendor_gross FROM settlement_orders WHERE settlement_id = $1 ORDER BY order_id ASC",
    )
    .bind(settlement_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

pub(crate) async fn update_settlement_status(
    settlement_id: &SettlementId,
    status: SettlementStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE settlements SET status = $1, updated_at = $2 WHERE settlement_id = $3")
        .bind(status)
        .bind(now)
        .bind(settlement_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
