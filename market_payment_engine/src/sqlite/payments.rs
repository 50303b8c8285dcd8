use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{IntentId, IntentStatus, NewPaymentIntent, PaymentIntent, ProviderEvent},
    sqlite::SqliteDatabaseError,
};

const INTENT_COLUMNS: &str =
    "id, intent_id, order_id, provider, provider_ref, amount, currency, status, created_at, updated_at";

pub(crate) async fn insert_intent(
    intent: NewPaymentIntent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"
        INSERT INTO payment_intents (intent_id, order_id, provider, provider_ref, amount, currency, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        "#,
    )
    .bind(intent.intent_id.as_str())
    .bind(intent.order_id.as_str())
    .bind(&intent.provider)
    .bind(&intent.provider_ref)
    .bind(intent.amount)
    .bind(&intent.currency)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    trace!("💳️ Inserted intent {} for order {}", intent.intent_id, intent.order_id);
    let intent = fetch_intent(&intent.intent_id, conn).await?.ok_or(sqlx::Error::RowNotFound)?;
    Ok(intent)
}

pub(crate) async fn fetch_intent(
    intent_id: &IntentId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, SqliteDatabaseError> {
    let q = format!("SELECT {INTENT_COLUMNS} FROM payment_intents WHERE intent_id = $1");
    match sqlx::query_as::<_, PaymentIntent>(&q).bind(intent_id.as_str()).fetch_one(conn).await {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(i) => Ok(Some(i)),
    }
}

pub(crate) async fn fetch_intent_by_provider_ref(
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, SqliteDatabaseError> {
    let q = format!("SELECT {INTENT_COLUMNS} FROM payment_intents WHERE provider_ref = $1");
    match sqlx::query_as::<_, PaymentIntent>(&q).bind(provider_ref).fetch_one(conn).await {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(i) => Ok(Some(i)),
    }
}

/// Fetches the non-terminal intent for the order, if any. The engine guarantees there is at most one.
pub(crate) async fn active_intent_for_order(
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, SqliteDatabaseError> {
    let q = format!(
        "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE order_id = $1 AND status IN ('Created', 'RequiresConfirmation')"
    );
    match sqlx::query_as::<_, PaymentIntent>(&q).bind(order_id).fetch_one(conn).await {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(i) => Ok(Some(i)),
    }
}

pub(crate) async fn update_intent_status(
    intent_id: &IntentId,
    status: IntentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE payment_intents SET status = $1, updated_at = $2 WHERE intent_id = $3")
        .bind(status)
        .bind(now)
        .bind(intent_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Records the provider event id. Returns `false` if the id was seen before (redelivery); the unique index on
/// `event_id` is the idempotency gate, so concurrent deliveries of the same event race safely here.
pub(crate) async fn record_event(
    event: &ProviderEvent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO webhook_events (event_id, event_type, provider_ref, received_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(&event.id)
    .bind(event.event_type.to_string())
    .bind(&event.provider_ref)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub(crate) async fn set_event_outcome(
    event_id: &str,
    outcome: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE webhook_events SET outcome = $1 WHERE event_id = $2")
        .bind(outcome)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}
