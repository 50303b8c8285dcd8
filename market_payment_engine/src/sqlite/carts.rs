use chrono::{DateTime, Utc};
use log::trace;
use mpg_common::Money;
use sqlx::SqliteConnection;

use crate::{db_types::{Cart, CartItem}, sqlite::SqliteDatabaseError};

pub(crate) async fn upsert_item(
    buyer_id: &str,
    item: CartItem,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"
        INSERT INTO cart_items (buyer_id, sku, quantity, unit_price, vendor_code, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (buyer_id, sku) DO UPDATE SET
            quantity = quantity + excluded.quantity,
            unit_price = excluded.unit_price,
            vendor_code = excluded.vendor_code,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(buyer_id)
    .bind(&item.sku)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(&item.vendor_code)
    .bind(now)
    .execute(conn)
    .await?;
    trace!("🛒️ Upserted {} into cart for buyer {buyer_id}", item.sku);
    Ok(())
}

pub(crate) async fn remove_item(
    buyer_id: &str,
    sku: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    // Removing an absent sku is a no-op
    let res = sqlx::query("DELETE FROM cart_items WHERE buyer_id = $1 AND sku = $2")
        .bind(buyer_id)
        .bind(sku)
        .execute(conn)
        .await?;
    trace!("🛒️ Removed {} row(s) for sku {sku} from cart for buyer {buyer_id}", res.rows_affected());
    Ok(())
}

pub(crate) async fn fetch_cart(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Cart, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, CartItem>(
        "SELECT sku, quantity, unit_price, vendor_code FROM cart_items WHERE buyer_id = $1 ORDER BY id ASC",
    )
    .bind(buyer_id)
    .fetch_all(conn)
    .await?;
    let subtotal: Money = items.iter().map(CartItem::line_total).sum();
    Ok(Cart { buyer_id: buyer_id.to_string(), items, subtotal })
}

pub(crate) async fn clear_cart(buyer_id: &str, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query("DELETE FROM cart_items WHERE buyer_id = $1").bind(buyer_id).execute(conn).await?;
    Ok(res.rows_affected())
}
