use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{FulfillmentStatus, NewOrder, NewOrderItem, Order, OrderId, OrderItem, PaymentStatus},
    mpe_api::order_objects::{OrderQueryFilter, SortOrder},
    sqlite::SqliteDatabaseError,
};

const ORDER_COLUMNS: &str = "id, order_id, buyer_id, currency, shipping_address, subtotal, tax, shipping, total, \
                             payment_status, fulfillment_status, created_at, updated_at";

pub(crate) async fn insert_order(
    order: NewOrder,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let address = serde_json::to_string(&order.shipping_address)?;
    let _ = sqlx::query(
        r#"
        INSERT INTO orders (
            order_id, buyer_id, currency, shipping_address,
            subtotal, tax, shipping, total,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.buyer_id)
    .bind(&order.currency)
    .bind(address)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.total)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    for item in items {
        let _ = sqlx::query(
            "INSERT INTO order_items (order_id, sku, quantity, unit_price, vendor_code) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order.order_id.as_str())
        .bind(&item.sku)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(&item.vendor_code)
        .execute(&mut *conn)
        .await?;
    }
    trace!("📦️ Inserted order {} with {} line items", order.order_id, items.len());
    let order = fetch_order_by_order_id(&order.order_id, conn)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(order)
}

pub(crate) async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let q = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
    let order = sqlx::query_as::<_, Order>(&q).bind(order_id.as_str()).fetch_one(conn).await;
    match order {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(o) => Ok(Some(o)),
    }
}

pub(crate) async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, sku, quantity, unit_price, vendor_code FROM order_items WHERE order_id = $1 ORDER BY id ASC",
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(items)
}

pub(crate) async fn update_payment_status(
    order_id: &OrderId,
    status: PaymentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE order_id = $3")
        .bind(status)
        .bind(now)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn update_fulfillment_status(
    order_id: &OrderId,
    status: FulfillmentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE orders SET fulfillment_status = $1, updated_at = $2 WHERE order_id = $3")
        .bind(status)
        .bind(now)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Appends the WHERE clause derived from `query` to `builder`. Used by both the result and the count query so
/// the two can never disagree.
fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, query: &OrderQueryFilter) {
    if query.is_unfiltered() {
        return;
    }
    builder.push(" WHERE ");
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = &query.buyer_id {
        where_clause.push("o.buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id.clone());
    }
    if let Some(vendor_code) = &query.vendor_code {
        where_clause.push("EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.order_id AND i.vendor_code = ");
        where_clause.push_bind_unseparated(vendor_code.clone());
        where_clause.push_unseparated(")");
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search.replace('%', ""));
        where_clause.push("(o.order_id LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.order_id AND i.sku LIKE ");
        where_clause.push_bind_unseparated(pattern);
        where_clause.push_unseparated("))");
    }
    if !query.payment_statuses.is_empty() {
        let statuses = query.payment_statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("o.payment_status IN ({statuses})"));
    }
    if !query.fulfillment_statuses.is_empty() {
        let statuses = query.fulfillment_statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("o.fulfillment_status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("o.created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("o.created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
}

/// Fetches one page of orders matching the filter, plus the total match count.
///
/// Results are ordered by `(created_at, id)`. The id tiebreaker keeps page boundaries stable when several orders
/// share a timestamp.
pub(crate) async fn search_orders(
    query: &OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<(i64, Vec<Order>), SqliteDatabaseError> {
    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM orders o");
    push_filters(&mut count_builder, query);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT o.id, o.order_id, o.buyer_id, o.currency, o.shipping_address, o.subtotal, o.tax, o.shipping, \
         o.total, o.payment_status, o.fulfillment_status, o.created_at, o.updated_at FROM orders o"
    ));
    push_filters(&mut builder, query);
    builder.push(match query.sort_order {
        SortOrder::Asc => " ORDER BY o.created_at ASC, o.id ASC LIMIT ",
        SortOrder::Desc => " ORDER BY o.created_at DESC, o.id DESC LIMIT ",
    });
    builder.push_bind(i64::from(query.pagination.limit));
    builder.push(" OFFSET ");
    builder.push_bind(query.pagination.offset());

    trace!("📦️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📦️ search_orders matched {total} orders, returning {}", orders.len());
    Ok((total, orders))
}
