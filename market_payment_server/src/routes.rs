//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers must never block the current thread.
//! Everything long-running here (database work, calls to the pricing service or payment provider) is awaited, so
//! worker threads keep serving other requests in the meantime.

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use market_payment_engine::{
    db_types::{
        CartItem,
        IntentId,
        OrderId,
        ProviderEvent,
        Role,
        SettlementId,
    },
    traits::{
        CartManagement,
        MarketDatabase,
        PaymentProvider,
        PricingPolicy,
        SettlementManagement,
        VendorPolicies,
        WebhookOutcome,
    },
    CartApi,
    OrderFlowApi,
    PaymentApi,
    SettlementApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{
        CartItemRequest,
        CheckoutRequest,
        FulfillmentRequest,
        IntentRequest,
        JsonResponse,
        OrderListQuery,
        SettlementRunRequest,
        SettlementStatusRequest,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),+])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------    Cart   ----------------------------------------------------
route!(my_cart => Get "/cart" impl CartManagement);
pub async fn my_cart<B: CartManagement>(
    claims: JwtClaims,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET cart for {}", claims.sub);
    let cart = api.cart(&claims.sub).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(add_cart_item => Post "/cart/items" impl CartManagement);
/// Adds (or tops up) one sku in the caller's cart and returns the updated cart.
pub async fn add_cart_item<B: CartManagement>(
    claims: JwtClaims,
    api: web::Data<CartApi<B>>,
    body: web::Json<CartItemRequest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️🛒️ {} adds {}x{} to their cart", claims.sub, req.quantity, req.sku);
    let item =
        CartItem { sku: req.sku, quantity: req.quantity, unit_price: req.unit_price, vendor_code: req.vendor_code };
    let cart = api.add_item(&claims.sub, item).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(remove_cart_item => Delete "/cart/items/{sku}" impl CartManagement);
pub async fn remove_cart_item<B: CartManagement>(
    claims: JwtClaims,
    api: web::Data<CartApi<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let sku = path.into_inner();
    debug!("💻️🛒️ {} removes {sku} from their cart", claims.sub);
    let cart = api.remove_item(&claims.sub, &sku).await?;
    Ok(HttpResponse::Ok().json(cart))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(checkout => Post "/orders" impl MarketDatabase, PricingPolicy);
/// Converts the caller's cart into an order and returns its public order id. Payment is a separate step (see
/// the payment intent routes).
pub async fn checkout<B: MarketDatabase, P: PricingPolicy>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, P>>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️📦️ Checkout requested by {}", claims.sub);
    let order = api.checkout(&claims.sub, req.shipping_address, &req.currency).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "id": order.order_id })))
}

route!(my_orders => Get "/orders" impl MarketDatabase, PricingPolicy);
/// Lists orders visible to the caller. Buyers see their own orders, vendors the orders carrying their lines, and
/// admins everything. Supports pagination and the filters in [`OrderListQuery`].
pub async fn my_orders<B: MarketDatabase, P: PricingPolicy>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, P>>,
    query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️📦️ Order search by {}", claims.sub);
    let result = api.search_orders_for_requester(&claims.requester(), query.to_filter()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "items": result.orders, "total": result.total })))
}

route!(order_by_id => Get "/orders/{order_id}" impl MarketDatabase, PricingPolicy);
pub async fn order_by_id<B: MarketDatabase, P: PricingPolicy>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, P>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let (order, items) = api.order_for_requester(&claims.requester(), &order_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "item": order, "line_items": items })))
}

route!(update_fulfillment => Post "/orders/{order_id}/fulfillment" impl MarketDatabase, PricingPolicy where requires [Role::Vendor, Role::Admin]);
/// Moves the order's fulfillment track forward. Re-posting the current status is an idempotent no-op; backward
/// moves are rejected with a 409. Vendors can only touch orders that carry their own line items.
pub async fn update_fulfillment<B: MarketDatabase, P: PricingPolicy>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B, P>>,
    path: web::Path<String>,
    body: web::Json<FulfillmentRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️📦️ {} sets fulfillment of {order_id} to {}", claims.sub, body.status);
    let order = api.update_fulfillment(&claims.requester(), &order_id, body.status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------  Payments  ----------------------------------------------------
route!(create_intent => Post "/payments/intents" impl MarketDatabase, PaymentProvider);
/// Registers a payment intent with the provider for an order awaiting payment. The response carries the
/// provider reference and client secret the frontend needs to drive the provider's payment flow.
pub async fn create_intent<B: MarketDatabase, P: PaymentProvider>(
    claims: JwtClaims,
    api: web::Data<PaymentApi<B, P>>,
    body: web::Json<IntentRequest>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️💳️ {} requests a payment intent for {}", claims.sub, body.order_id);
    let intent = api.create_intent(&body.order_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "intent": intent })))
}

route!(intent_by_id => Get "/payments/intents/{intent_id}" impl MarketDatabase, PaymentProvider);
pub async fn intent_by_id<B: MarketDatabase, P: PaymentProvider>(
    _claims: JwtClaims,
    api: web::Data<PaymentApi<B, P>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let intent_id = IntentId(path.into_inner());
    let intent =
        api.fetch_intent(&intent_id).await?.ok_or_else(|| ServerError::NoRecordFound(intent_id.to_string()))?;
    Ok(HttpResponse::Ok().json(intent))
}

#[cfg(feature = "dev-tools")]
route!(confirm_intent => Post "/payments/intents/{intent_id}/confirm" impl MarketDatabase, PaymentProvider where requires [Role::Admin]);
/// Marks the intent as succeeded without involving the provider, by synthesizing the webhook event the provider
/// would have sent. Strictly a development aid, which is why it is locked behind the `dev-tools` feature.
#[cfg(feature = "dev-tools")]
pub async fn confirm_intent<B: MarketDatabase, P: PaymentProvider>(
    claims: JwtClaims,
    api: web::Data<PaymentApi<B, P>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let intent_id = IntentId(path.into_inner());
    warn!("💻️💳️ {} manually confirms intent {intent_id}. This should never happen in production!", claims.sub);
    let outcome = api.confirm_intent(&intent_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(webhook_outcome_message(&outcome))))
}

//----------------------------------------------  Webhook   ----------------------------------------------------
route!(webhook => Post "" impl MarketDatabase, PaymentProvider);
/// Receives payment events from the provider. The HMAC middleware has already verified the signature by the
/// time this handler runs, so every outcome here, including duplicates, orphans and conflicts, is acknowledged
/// with a 2xx. Anything else would make the provider redeliver an event we have already dealt with.
pub async fn webhook<B: MarketDatabase, P: PaymentProvider>(
    api: web::Data<PaymentApi<B, P>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    let event = match serde_json::from_slice::<ProviderEvent>(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("💻️📬️ Received a correctly signed webhook with a malformed payload. {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure(format!("Malformed event payload. {e}"))));
        },
    };
    trace!("💻️📬️ Received provider event {}", event.id);
    let outcome = api.handle_event(&event).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(webhook_outcome_message(&outcome))))
}

fn webhook_outcome_message(outcome: &WebhookOutcome) -> String {
    match outcome {
        WebhookOutcome::Applied { order, .. } => {
            format!("Event applied. Order {} payment is now {}", order.order_id, order.payment_status)
        },
        WebhookOutcome::Duplicate { event_id } => format!("Event {event_id} has already been processed"),
        WebhookOutcome::Orphaned { provider_ref } => {
            format!("No payment intent matches provider reference {provider_ref}")
        },
        WebhookOutcome::Conflict { provider_ref, existing } => {
            format!("Intent for {provider_ref} is already {existing}")
        },
    }
}

//---------------------------------------------  Settlements  --------------------------------------------------
route!(run_settlements => Post "/settlements/run" impl SettlementManagement, VendorPolicies where requires [Role::Admin]);
/// Runs a settlement batch over the given period. Safe to re-run: already-settled orders are skipped, and a
/// vendor whose candidates were all settled by an earlier run produces no new settlement.
pub async fn run_settlements<B: SettlementManagement, V: VendorPolicies>(
    claims: JwtClaims,
    api: web::Data<SettlementApi<B, V>>,
    body: web::Json<SettlementRunRequest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    if req.period_start >= req.period_end {
        return Err(ServerError::InvalidRequestBody("period_start must lie before period_end".to_string()));
    }
    info!("💻️🧾️ {} runs settlements for {} to {}", claims.sub, req.period_start, req.period_end);
    let result = api.run_batch(req.period_start, req.period_end).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(settlement_by_id => Get "/settlements/{settlement_id}" impl SettlementManagement, VendorPolicies where requires [Role::Vendor, Role::Admin]);
/// Fetches one settlement with its member lines. Vendors can only see their own settlements.
pub async fn settlement_by_id<B: SettlementManagement, V: VendorPolicies>(
    claims: JwtClaims,
    api: web::Data<SettlementApi<B, V>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let settlement_id = SettlementId(path.into_inner());
    let (settlement, lines) = api
        .fetch_settlement(&settlement_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(settlement_id.to_string()))?;
    let requester = claims.requester();
    if !requester.is_admin() && settlement.vendor_code != requester.user_id {
        debug!("💻️🧾️ {} tried to read settlement {settlement_id} belonging to {}", claims.sub, settlement.vendor_code);
        return Err(ServerError::InsufficientPermissions("This settlement belongs to another vendor".to_string()));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "settlement": settlement, "lines": lines })))
}

route!(settlement_csv => Get "/settlements/{settlement_id}/csv" impl SettlementManagement, VendorPolicies where requires [Role::Vendor, Role::Admin]);
/// The settlement as CSV: one row per settled order, then a TOTAL row. Vendors can only export their own.
pub async fn settlement_csv<B: SettlementManagement, V: VendorPolicies>(
    claims: JwtClaims,
    api: web::Data<SettlementApi<B, V>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let settlement_id = SettlementId(path.into_inner());
    let requester = claims.requester();
    if !requester.is_admin() {
        let (settlement, _) = api
            .fetch_settlement(&settlement_id)
            .await?
            .ok_or_else(|| ServerError::NoRecordFound(settlement_id.to_string()))?;
        if settlement.vendor_code != requester.user_id {
            return Err(ServerError::InsufficientPermissions(
                "This settlement belongs to another vendor".to_string(),
            ));
        }
    }
    let csv = api.export_csv(&settlement_id).await?;
    Ok(HttpResponse::Ok().content_type("text/csv").body(csv))
}

route!(settlement_status => Post "/settlements/{settlement_id}/status" impl SettlementManagement, VendorPolicies where requires [Role::Admin]);
/// Moves a settlement along the payout track (Pending -> Processing -> Paid). Re-posting the current status is
/// an idempotent no-op.
pub async fn settlement_status<B: SettlementManagement, V: VendorPolicies>(
    claims: JwtClaims,
    api: web::Data<SettlementApi<B, V>>,
    path: web::Path<String>,
    body: web::Json<SettlementStatusRequest>,
) -> Result<HttpResponse, ServerError> {
    let settlement_id = SettlementId(path.into_inner());
    debug!("💻️🧾️ {} sets settlement {settlement_id} to {}", claims.sub, body.status);
    let settlement = api.mark_settlement_status(&settlement_id, body.status).await?;
    Ok(HttpResponse::Ok().json(settlement))
}
