use actix_web::{
    body::{to_bytes, MessageBody},
    error::ErrorInternalServerError,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
    ResponseError,
};
use market_payment_engine::{
    db_types::{PaymentStatus, Role},
    events::EventProducers,
    helpers::sign_payload,
    traits::WebhookOutcome,
    PaymentApi,
};
use mpg_common::Secret;
use serde_json::json;

use super::{
    helpers::{get_request, issue_token, post_request},
    mocks::{intent, order, MockMarketDb, StubProvider},
};
use crate::{
    middleware::HmacMiddlewareFactory,
    routes::{CreateIntentRoute, IntentByIdRoute, WebhookRoute},
};

const WEBHOOK_SECRET: &str = "whsec_test_do_not_reuse";

fn configure_payments(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order("MP-test0001", "buyer-1"))));
    db.expect_insert_intent().returning(|_| Ok(intent("PI-test0001", "MP-test0001")));
    db.expect_fetch_intent().returning(|_| Ok(Some(intent("PI-test0001", "MP-test0001"))));
    let api = PaymentApi::new(db, StubProvider, EventProducers::default());
    cfg.service(CreateIntentRoute::<MockMarketDb, StubProvider>::new())
        .service(IntentByIdRoute::<MockMarketDb, StubProvider>::new())
        .app_data(web::Data::new(api));
}

fn configure_missing_order(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
    let api = PaymentApi::new(db, StubProvider, EventProducers::default());
    cfg.service(CreateIntentRoute::<MockMarketDb, StubProvider>::new()).app_data(web::Data::new(api));
}

fn applied_outcome() -> WebhookOutcome {
    let mut paid = order("MP-test0001", "buyer-1");
    paid.payment_status = PaymentStatus::Paid;
    WebhookOutcome::Applied { order: paid, intent: intent("PI-test0001", "MP-test0001") }
}

fn configure_webhook_applied(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_apply_provider_event().returning(|_| Ok(applied_outcome()));
    let api = PaymentApi::new(db, StubProvider, EventProducers::default());
    cfg.app_data(web::Data::new(api));
}

fn configure_webhook_duplicate(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_apply_provider_event()
        .returning(|event| Ok(WebhookOutcome::Duplicate { event_id: event.id.clone() }));
    let api = PaymentApi::new(db, StubProvider, EventProducers::default());
    cfg.app_data(web::Data::new(api));
}

/// Posts `body` to the webhook route behind the HMAC middleware. The route registration lives here rather than
/// in `configure` so each test controls the signature header and whether checks are enabled.
async fn post_webhook(
    body: &str,
    signature: Option<&str>,
    checks_enabled: bool,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), actix_web::Error> {
    let mut req = TestRequest::post().uri("/webhook").set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header(("x-provider-signature", sig));
    }
    let req = req.to_request();
    let scope = web::scope("/webhook")
        .wrap(HmacMiddlewareFactory::new(
            "x-provider-signature",
            Secret::new(WEBHOOK_SECRET.to_string()),
            checks_enabled,
        ))
        .service(WebhookRoute::<MockMarketDb, StubProvider>::new());
    let app = App::new().configure(configure).service(scope);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req).await?.into_parts();
    let status = res.status();
    let bytes =
        res.into_body().try_into_bytes().map_err(|_| ErrorInternalServerError("Could not read response body"))?;
    Ok((status, String::from_utf8_lossy(&bytes).into_owned()))
}

fn event_json() -> String {
    json!({ "id": "evt_001", "type": "payment_succeeded", "provider_ref": "pr_MP-test0001" }).to_string()
}

#[actix_web::test]
async fn create_intent() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let body = json!({ "order_id": "MP-test0001" });
    let (status, body) = post_request(&token, "/payments/intents", body, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["ok"], true);
    assert_eq!(response["intent"]["intent_id"], "PI-test0001");
    assert_eq!(response["intent"]["provider_ref"], "pr_MP-test0001");
}

#[actix_web::test]
async fn create_intent_for_unknown_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let body = json!({ "order_id": "MP-nope" });
    let err = post_request(&token, "/payments/intents", body, configure_missing_order)
        .await
        .expect_err("Expected error");
    assert!(err.contains("The data was not found"), "unexpected error: {err}");
}

#[actix_web::test]
async fn fetch_intent_by_id() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let (status, body) =
        get_request(&token, "/payments/intents/PI-test0001", configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let intent: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(intent["order_id"], "MP-test0001");
}

#[actix_web::test]
async fn webhook_with_valid_signature_is_applied() {
    let _ = env_logger::try_init().ok();
    let body = event_json();
    let sig = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) =
        post_webhook(&body, Some(&sig), true, configure_webhook_applied).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["success"], true);
    assert!(response["message"].as_str().unwrap().contains("Event applied"));
}

#[actix_web::test]
async fn webhook_with_bad_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = event_json();
    let err = post_webhook(&body, Some("bm90IGEgcmVhbCBzaWduYXR1cmU="), true, configure_webhook_applied)
        .await
        .expect_err("Expected error");
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    let bytes = to_bytes(err.error_response().into_body()).await.expect("Could not read error body");
    let envelope: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["kind"], "invalid_signature");
    assert!(envelope["error"].as_str().unwrap().contains("signature does not match"), "unexpected: {envelope}");
}

#[actix_web::test]
async fn webhook_without_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = event_json();
    let err = post_webhook(&body, None, true, configure_webhook_applied).await.expect_err("Expected error");
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    let bytes = to_bytes(err.error_response().into_body()).await.expect("Could not read error body");
    let envelope: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope["kind"], "invalid_signature");
    assert!(
        envelope["error"].as_str().unwrap().contains("No signature header was provided."),
        "unexpected: {envelope}"
    );
}

#[actix_web::test]
async fn redelivered_webhook_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = event_json();
    let sig = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) =
        post_webhook(&body, Some(&sig), true, configure_webhook_duplicate).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["success"], true);
    assert!(response["message"].as_str().unwrap().contains("already been processed"));
}

#[actix_web::test]
async fn signed_but_malformed_webhook_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = "this is not an event";
    let sig = sign_payload(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) =
        post_webhook(body, Some(&sig), true, configure_webhook_applied).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["success"], false);
}

#[actix_web::test]
async fn webhook_checks_can_be_disabled() {
    let _ = env_logger::try_init().ok();
    let body = event_json();
    let (status, _) = post_webhook(&body, None, false, configure_webhook_applied).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
}
