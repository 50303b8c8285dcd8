use std::str::FromStr;

use chrono::Utc;
use log::{debug, warn};
use mpg_common::Money;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    db_types::{
        Cart,
        CartItem,
        FulfillmentStatus,
        IntentId,
        IntentStatus,
        NewOrder,
        NewOrderItem,
        NewPaymentIntent,
        Order,
        OrderId,
        OrderItem,
        PaymentIntent,
        PaymentStatus,
        ProviderEvent,
        ProviderEventType,
        Settlement,
        SettlementId,
        SettlementLine,
        SettlementStatus,
    },
    mpe_api::order_objects::{OrderQueryFilter, OrderSearchResult},
    sqlite::{carts, orders, payments, settlements, SqliteDatabaseError},
    traits::{
        CartError,
        CartManagement,
        MarketDatabase,
        MarketError,
        NewSettlement,
        OrderManagement,
        OrderQueryError,
        SettlementError,
        SettlementManagement,
        WebhookOutcome,
    },
};

/// The SQLite storage backend for the marketplace payment engine. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connects to the database at `url` (created if missing) and applies any pending migrations.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("🗃️ Connected to database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction that takes the write lock up front. sqlx's `begin` issues a deferred `BEGIN`, and a
    /// transaction that reads before writing can then hit `SQLITE_BUSY` when it tries to upgrade its lock under
    /// a concurrent writer. The no-op write moves the lock acquisition to the start of the transaction, where it
    /// waits on the busy timeout instead.
    async fn begin_write(&self) -> Result<sqlx::Transaction<'_, sqlx::Sqlite>, SqliteDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let _ = sqlx::query("UPDATE orders SET id = id WHERE 1 = 0").execute(&mut *tx).await?;
        Ok(tx)
    }
}

impl CartManagement for SqliteDatabase {
    async fn upsert_cart_item(&self, buyer_id: &str, item: CartItem) -> Result<Cart, CartError> {
        if item.quantity <= 0 {
            return Err(CartError::InvalidQuantity(item.quantity));
        }
        let mut tx = self.begin_write().await?;
        carts::upsert_item(buyer_id, item, Utc::now(), &mut tx).await?;
        let cart = carts::fetch_cart(buyer_id, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(cart)
    }

    async fn remove_cart_item(&self, buyer_id: &str, sku: &str) -> Result<Cart, CartError> {
        let mut tx = self.begin_write().await?;
        carts::remove_item(buyer_id, sku, &mut tx).await?;
        let cart = carts::fetch_cart(buyer_id, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(cart)
    }

    async fn fetch_cart(&self, buyer_id: &str) -> Result<Cart, CartError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let cart = carts::fetch_cart(buyer_id, &mut conn).await?;
        Ok(cart)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderQueryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<OrderSearchResult, OrderQueryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let (total, orders) = orders::search_orders(&query, &mut conn).await?;
        Ok(OrderSearchResult { total, page: query.pagination.page, limit: query.pagination.limit, orders })
    }
}

impl MarketDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        &self.url
    }

    async fn checkout_cart(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, MarketError> {
        let buyer_id = order.buyer_id.clone();
        let mut tx = self.begin_write().await?;
        let order = orders::insert_order(order, &items, &mut tx).await?;
        let cleared = carts::clear_cart(&buyer_id, &mut tx).await?;
        if cleared < items.len() as u64 {
            // A concurrent checkout consumed the cart after it was snapshotted. Dropping the transaction rolls
            // the order back; the cart rows belong to whoever cleared them first.
            warn!("📦️ Cart for buyer {buyer_id} was consumed mid-checkout ({cleared} of {} rows left)", items.len());
            return Err(MarketError::EmptyCart(buyer_id));
        }
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!("📦️ Checked out order {} for buyer {buyer_id} ({cleared} cart rows cleared)", order.order_id);
        Ok(order)
    }

    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, MarketError> {
        let mut tx = self.begin_write().await?;
        let order = orders::fetch_order_by_order_id(&intent.order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketError::OrderNotFound(intent.order_id.clone()))?;
        if order.payment_status != PaymentStatus::Pending {
            return Err(MarketError::OrderNotPending(intent.order_id.clone()));
        }
        if payments::active_intent_for_order(intent.order_id.as_str(), &mut tx).await?.is_some() {
            return Err(MarketError::IntentAlreadyActive(intent.order_id.clone()));
        }
        let now = Utc::now();
        let order_id = intent.order_id.clone();
        let intent = payments::insert_intent(intent, now, &mut tx).await?;
        orders::update_payment_status(&order_id, PaymentStatus::Processing, now, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(intent)
    }

    async fn fetch_intent(&self, intent_id: &IntentId) -> Result<Option<PaymentIntent>, MarketError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let intent = payments::fetch_intent(intent_id, &mut conn).await?;
        Ok(intent)
    }

    async fn apply_provider_event(&self, event: &ProviderEvent) -> Result<WebhookOutcome, MarketError> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;
        if !payments::record_event(event, now, &mut tx).await? {
            tx.commit().await.map_err(SqliteDatabaseError::from)?;
            return Ok(WebhookOutcome::Duplicate { event_id: event.id.clone() });
        }
        let intent = match payments::fetch_intent_by_provider_ref(&event.provider_ref, &mut tx).await? {
            Some(intent) => intent,
            None => {
                payments::set_event_outcome(&event.id, "orphaned", &mut tx).await?;
                tx.commit().await.map_err(SqliteDatabaseError::from)?;
                return Ok(WebhookOutcome::Orphaned { provider_ref: event.provider_ref.clone() });
            },
        };
        if intent.status.is_terminal() {
            // First terminal state wins. The later event is recorded but never applied.
            payments::set_event_outcome(&event.id, "conflict", &mut tx).await?;
            tx.commit().await.map_err(SqliteDatabaseError::from)?;
            return Ok(WebhookOutcome::Conflict { provider_ref: event.provider_ref.clone(), existing: intent.status });
        }
        let (intent_status, payment_status) = match event.event_type {
            ProviderEventType::PaymentSucceeded => (IntentStatus::Succeeded, PaymentStatus::Paid),
            ProviderEventType::PaymentFailed => (IntentStatus::Failed, PaymentStatus::Failed),
        };
        payments::update_intent_status(&intent.intent_id, intent_status, now, &mut tx).await?;
        orders::update_payment_status(&intent.order_id, payment_status, now, &mut tx).await?;
        payments::set_event_outcome(&event.id, "applied", &mut tx).await?;
        let order = orders::fetch_order_by_order_id(&intent.order_id, &mut tx).await?;
        let intent = payments::fetch_intent(&intent.intent_id, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        match (order, intent) {
            (Some(order), Some(intent)) => Ok(WebhookOutcome::Applied { order, intent }),
            _ => {
                // The intent pointed at an order that no longer resolves. Data inconsistency, not a caller error.
                warn!("💳️ Intent for {} resolved but its order vanished mid-transaction", event.provider_ref);
                Ok(WebhookOutcome::Orphaned { provider_ref: event.provider_ref.clone() })
            },
        }
    }

    async fn update_fulfillment_status(
        &self,
        order_id: &OrderId,
        new_status: FulfillmentStatus,
    ) -> Result<Order, MarketError> {
        let mut tx = self.begin_write().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))?;
        if order.fulfillment_status == new_status {
            // Idempotent no-op: return the unchanged order
            return Ok(order);
        }
        if !order.fulfillment_status.can_transition_to(new_status) {
            return Err(MarketError::InvalidTransition { from: order.fulfillment_status, to: new_status });
        }
        orders::update_fulfillment_status(order_id, new_status, Utc::now(), &mut tx).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(order)
    }

    async fn close(&mut self) -> Result<(), MarketError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SettlementManagement for SqliteDatabase {
    async fn fetch_settleable_lines(
        &self,
        period_start: chrono::DateTime<Utc>,
        period_end: chrono::DateTime<Utc>,
    ) -> Result<Vec<SettlementLine>, SettlementError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let lines = settlements::settleable_lines(period_start, period_end, &mut conn).await?;
        Ok(lines)
    }

    async fn insert_settlement(&self, settlement: NewSettlement) -> Result<Option<Settlement>, SettlementError> {
        let mut tx = self.begin_write().await?;
        let now = Utc::now();
        settlements::insert_settlement_row(
            &settlement.settlement_id,
            &settlement.vendor_code,
            settlement.period_start,
            settlement.period_end,
            now,
            &mut tx,
        )
        .await?;
        let mut gross = Money::default();
        let mut attached = 0usize;
        for line in &settlement.lines {
            if settlements::try_attach_line(&settlement.settlement_id, line, &mut tx).await? {
                gross = gross + line.vendor_gross;
                attached += 1;
            }
        }
        if attached == 0 {
            // Every candidate was settled by a concurrent run. Roll the settlement row back.
            tx.rollback().await.map_err(SqliteDatabaseError::from)?;
            return Ok(None);
        }
        let commission = settlement.policy.commission_on(gross);
        let net = gross - commission;
        settlements::update_settlement_totals(&settlement.settlement_id, gross, commission, net, now, &mut tx).await?;
        let stored = settlements::fetch_settlement(&settlement.settlement_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::SettlementNotFound(settlement.settlement_id.clone()))?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!(
            "🧾️ Settlement {} for vendor {} covers {attached} orders (gross {gross}, net {net})",
            stored.settlement_id, stored.vendor_code
        );
        Ok(Some(stored))
    }

    async fn fetch_settlement(
        &self,
        settlement_id: &SettlementId,
    ) -> Result<Option<(Settlement, Vec<SettlementLine>)>, SettlementError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let settlement = match settlements::fetch_settlement(settlement_id, &mut conn).await? {
            Some(s) => s,
            None => return Ok(None),
        };
        let lines = settlements::fetch_settlement_lines(settlement_id, &mut conn).await?;
        Ok(Some((settlement, lines)))
    }

    async fn update_settlement_status(
        &self,
        settlement_id: &SettlementId,
        new_status: SettlementStatus,
    ) -> Result<Settlement, SettlementError> {
        let mut tx = self.begin_write().await?;
        let settlement = settlements::fetch_settlement(settlement_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::SettlementNotFound(settlement_id.clone()))?;
        if settlement.status == new_status {
            return Ok(settlement);
        }
        if !settlement.status.can_transition_to(new_status) {
            return Err(SettlementError::InvalidStatusChange { from: settlement.status, to: new_status });
        }
        settlements::update_settlement_status(settlement_id, new_status, Utc::now(), &mut tx).await?;
        let settlement = settlements::fetch_settlement(settlement_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::SettlementNotFound(settlement_id.clone()))?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(settlement)
    }
}
