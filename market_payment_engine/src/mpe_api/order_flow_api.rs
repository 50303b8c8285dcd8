use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{FulfillmentStatus, NewOrder, NewOrderItem, Order, OrderId, OrderItem, Requester, Role, ShippingAddress},
    helpers::new_order_id,
    mpe_api::order_objects::{OrderQueryFilter, OrderSearchResult},
    traits::{MarketDatabase, MarketError, PricingPolicy},
};

/// `OrderFlowApi` is the primary API for the order lifecycle: checkout, lookup and fulfillment transitions.
pub struct OrderFlowApi<B, P> {
    db: B,
    pricing: P,
}

impl<B, P> Debug for OrderFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, P> OrderFlowApi<B, P> {
    pub fn new(db: B, pricing: P) -> Self {
        Self { db, pricing }
    }
}

impl<B, P> OrderFlowApi<B, P>
where
    B: MarketDatabase,
    P: PricingPolicy,
{
    /// Converts the buyer's cart into an order.
    ///
    /// The cart must be non-empty and the shipping address valid. Tax and shipping come from the pricing
    /// collaborator; the totals are computed here, once, and never change afterwards. The cart is cleared in the
    /// same transaction that persists the order, so a failed checkout leaves the cart untouched. If a concurrent
    /// checkout by the same buyer consumes the cart first, this one fails with [`MarketError::EmptyCart`] and
    /// persists nothing.
    pub async fn checkout(&self, buyer_id: &str, address: ShippingAddress, currency: &str) -> Result<Order, MarketError> {
        let cart = self.db.fetch_cart(buyer_id).await?;
        if cart.is_empty() {
            return Err(MarketError::EmptyCart(buyer_id.to_string()));
        }
        address.validate().map_err(MarketError::InvalidAddress)?;
        let items = cart.items.into_iter().map(NewOrderItem::from).collect::<Vec<_>>();
        let quote = self.pricing.quote(&items, &address, currency).await?;
        let subtotal = cart.subtotal;
        let total = subtotal + quote.tax + quote.shipping;
        let order = NewOrder {
            order_id: new_order_id(),
            buyer_id: buyer_id.to_string(),
            currency: currency.to_string(),
            shipping_address: address,
            subtotal,
            tax: quote.tax,
            shipping: quote.shipping,
            total,
            created_at: Utc::now(),
        };
        let order = self.db.checkout_cart(order, items).await?;
        info!("🔄️📦️ Buyer {buyer_id} checked out order {} for {}", order.order_id, order.total);
        Ok(order)
    }

    /// Fetches an order on behalf of `requester`. Buyers may only see their own orders; admins see everything.
    pub async fn order_for_requester(
        &self,
        requester: &Requester,
        order_id: &OrderId,
    ) -> Result<(Order, Vec<OrderItem>), MarketError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))?;
        if order.buyer_id != requester.user_id && !requester.is_admin() {
            // Not-found and forbidden are deliberately distinct: the order exists, the caller may know that much.
            return Err(MarketError::Forbidden(format!("Order {order_id} does not belong to {}", requester.user_id)));
        }
        let items = self.db.fetch_order_items(order_id).await?;
        Ok((order, items))
    }

    /// Searches orders on behalf of `requester`. Non-admin buyers are always scoped to their own orders; vendors
    /// are scoped to orders containing their items, unless they are also admins.
    pub async fn search_orders_for_requester(
        &self,
        requester: &Requester,
        mut query: OrderQueryFilter,
    ) -> Result<OrderSearchResult, MarketError> {
        if !requester.is_admin() {
            if requester.has_role(Role::Vendor) {
                query.vendor_code = Some(requester.user_id.clone());
            } else {
                query.buyer_id = Some(requester.user_id.clone());
            }
        }
        let result = self.db.search_orders(query).await?;
        Ok(result)
    }

    /// Moves the order along its fulfillment track on behalf of `actor`. Admins may touch any order; vendors
    /// only orders carrying at least one of their line items. Re-applying the current status is an idempotent
    /// no-op; anything that is not a legal forward transition is rejected.
    pub async fn update_fulfillment(
        &self,
        actor: &Requester,
        order_id: &OrderId,
        new_status: FulfillmentStatus,
    ) -> Result<Order, MarketError> {
        if !actor.is_admin() {
            self.db
                .fetch_order_by_order_id(order_id)
                .await?
                .ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))?;
            let items = self.db.fetch_order_items(order_id).await?;
            if !items.iter().any(|item| item.vendor_code == actor.user_id) {
                return Err(MarketError::Forbidden(format!(
                    "Order {order_id} has no line items for vendor {}",
                    actor.user_id
                )));
            }
        }
        let order = self.db.update_fulfillment_status(order_id, new_status).await?;
        debug!("🔄️📦️ Order {order_id} fulfillment is now {} (set by {})", order.fulfillment_status, actor.user_id);
        Ok(order)
    }
}
