use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use market_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CartApi,
    OrderFlowApi,
    PaymentApi,
    SettlementApi,
    SqliteDatabase,
};

use crate::{
    auth::{JwtAuthMiddlewareFactory, TokenIssuer},
    config::ServerConfig,
    errors::ServerError,
    integrations::{PricingClient, ProviderClient, StaticVendorPolicies},
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        AddCartItemRoute,
        CheckoutRoute,
        CreateIntentRoute,
        IntentByIdRoute,
        MyCartRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        RemoveCartItemRoute,
        RunSettlementsRoute,
        SettlementByIdRoute,
        SettlementCsvRoute,
        SettlementStatusRoute,
        UpdateFulfillmentRoute,
        WebhookRoute,
    },
};

/// Size of each event handler's delivery buffer.
const EVENT_BUFFER_SIZE: usize = 50;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The default event hooks log lifecycle milestones. Deployments that need to notify buyers or vendors replace
/// these with their own hooks and call [`create_server_instance`] directly.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev| {
        Box::pin(async move {
            info!("📬️💳️ Order {} has been paid in full ({})", ev.order.order_id, ev.order.total);
        })
    });
    hooks.on_payment_failed(|ev| {
        Box::pin(async move {
            info!("📬️💳️ Payment for order {} failed. Intent {} is {}", ev.order.order_id, ev.intent.intent_id, ev.status);
        })
    });
    hooks.on_settlement_created(|ev| {
        Box::pin(async move {
            info!(
                "📬️🧾️ Settlement {} created for {}: net {} after commission",
                ev.settlement.settlement_id, ev.settlement.vendor_code, ev.settlement.net_amount
            );
        })
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<actix_web::dev::Server, ServerError> {
    let pricing = PricingClient::try_new(&config.upstream)?;
    let provider = ProviderClient::try_new(&config.upstream)?;
    let vendors = StaticVendorPolicies::new(&config.vendors);
    let srv = HttpServer::new(move || {
        let cart_api = CartApi::new(db.clone());
        let order_flow_api = OrderFlowApi::new(db.clone(), pricing.clone());
        let payment_api = PaymentApi::new(db.clone(), provider.clone(), producers.clone());
        let settlement_api = SettlementApi::new(db.clone(), vendors.clone(), producers.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(web::Data::new(cart_api))
            .app_data(web::Data::new(order_flow_api))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(jwt_signer));
        // The webhook is authenticated by its HMAC signature, not by a JWT, so it lives in its own scope. It
        // must be registered before the /market scope, or actix would match the shorter prefix first.
        let webhook_scope = web::scope("/market/payments/webhook")
            .wrap(HmacMiddlewareFactory::new(
                &config.webhook.hmac_header,
                config.webhook.hmac_secret.clone(),
                config.webhook.hmac_checks,
            ))
            .service(WebhookRoute::<SqliteDatabase, ProviderClient>::new());
        // Everything else requires a valid access token.
        let market_scope = web::scope("/market")
            .wrap(JwtAuthMiddlewareFactory::new(&config.auth))
            .service(MyCartRoute::<SqliteDatabase>::new())
            .service(AddCartItemRoute::<SqliteDatabase>::new())
            .service(RemoveCartItemRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase, PricingClient>::new())
            .service(MyOrdersRoute::<SqliteDatabase, PricingClient>::new())
            .service(OrderByIdRoute::<SqliteDatabase, PricingClient>::new())
            .service(UpdateFulfillmentRoute::<SqliteDatabase, PricingClient>::new())
            .service(CreateIntentRoute::<SqliteDatabase, ProviderClient>::new())
            .service(IntentByIdRoute::<SqliteDatabase, ProviderClient>::new())
            .service(RunSettlementsRoute::<SqliteDatabase, StaticVendorPolicies>::new())
            .service(SettlementByIdRoute::<SqliteDatabase, StaticVendorPolicies>::new())
            .service(SettlementCsvRoute::<SqliteDatabase, StaticVendorPolicies>::new())
            .service(SettlementStatusRoute::<SqliteDatabase, StaticVendorPolicies>::new());
        #[cfg(feature = "dev-tools")]
        let market_scope =
            market_scope.service(crate::routes::ConfirmIntentRoute::<SqliteDatabase, ProviderClient>::new());
        app.service(webhook_scope).service(market_scope).service(health)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
