use actix_web::{http::StatusCode, web, web::ServiceConfig};
use market_payment_engine::{
    db_types::{CommissionPolicy, Role, SettlementStatus},
    events::EventProducers,
    SettlementApi,
};
use serde_json::json;

use super::{
    helpers::{get_request, issue_token, post_request},
    mocks::{line, settlement, MockSettlementDb, StubVendors},
};
use crate::routes::{RunSettlementsRoute, SettlementByIdRoute, SettlementCsvRoute, SettlementStatusRoute};

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockSettlementDb::new();
    db.expect_fetch_settleable_lines()
        .returning(|_, _| Ok(vec![line("MP-test0001", "acme", 12_000), line("MP-test0002", "acme", 8_000)]));
    db.expect_insert_settlement().returning(|_| Ok(Some(settlement("ST-test0001", "acme"))));
    db.expect_fetch_settlement().returning(|_| {
        Ok(Some((settlement("ST-test0001", "acme"), vec![
            line("MP-test0001", "acme", 12_000),
            line("MP-test0002", "acme", 8_000),
        ])))
    });
    let mut paid = settlement("ST-test0001", "acme");
    paid.status = SettlementStatus::Processing;
    db.expect_update_settlement_status().returning(move |_, _| Ok(paid.clone()));
    let api = SettlementApi::new(db, StubVendors(CommissionPolicy::Percentage { basis_points: 250 }), EventProducers::default());
    cfg.service(RunSettlementsRoute::<MockSettlementDb, StubVendors>::new())
        .service(SettlementByIdRoute::<MockSettlementDb, StubVendors>::new())
        .service(SettlementCsvRoute::<MockSettlementDb, StubVendors>::new())
        .service(SettlementStatusRoute::<MockSettlementDb, StubVendors>::new())
        .app_data(web::Data::new(api));
}

fn configure_missing(cfg: &mut ServiceConfig) {
    let mut db = MockSettlementDb::new();
    db.expect_fetch_settlement().returning(|_| Ok(None));
    let api = SettlementApi::new(db, StubVendors(CommissionPolicy::Percentage { basis_points: 250 }), EventProducers::default());
    cfg.service(SettlementByIdRoute::<MockSettlementDb, StubVendors>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn buyers_cannot_run_settlements() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let body = json!({ "period_start": "2024-06-01T00:00:00Z", "period_end": "2024-07-01T00:00:00Z" });
    let err = post_request(&token, "/settlements/run", body, configure).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn admins_run_settlement_batches() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let body = json!({ "period_start": "2024-06-01T00:00:00Z", "period_end": "2024-07-01T00:00:00Z" });
    let (status, body) = post_request(&token, "/settlements/run", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["orders_settled"], 2);
    assert_eq!(result["orders_skipped"], 0);
    assert_eq!(result["settlements"][0]["settlement_id"], "ST-test0001");
}

#[actix_web::test]
async fn an_empty_period_is_rejected() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let body = json!({ "period_start": "2024-07-01T00:00:00Z", "period_end": "2024-06-01T00:00:00Z" });
    let err = post_request(&token, "/settlements/run", body, configure).await.expect_err("Expected error");
    assert!(err.contains("period_start must lie before period_end"), "unexpected error: {err}");
}

#[actix_web::test]
async fn vendors_see_their_own_settlements() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("acme", vec![Role::Vendor]);
    let (status, body) = get_request(&token, "/settlements/ST-test0001", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["settlement"]["vendor_code"], "acme");
    assert_eq!(response["lines"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn vendors_cannot_see_other_vendors_settlements() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("globex", vec![Role::Vendor]);
    let err = get_request(&token, "/settlements/ST-test0001", configure).await.expect_err("Expected error");
    assert!(err.contains("belongs to another vendor"), "unexpected error: {err}");
}

#[actix_web::test]
async fn missing_settlement_is_not_found() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let err = get_request(&token, "/settlements/ST-nope", configure_missing).await.expect_err("Expected error");
    assert!(err.contains("The data was not found"), "unexpected error: {err}");
}

#[actix_web::test]
async fn settlement_csv_export() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let (status, body) = get_request(&token, "/settlements/ST-test0001/csv", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("settlement_id,vendor_code,period_start,period_end,status,order_id,vendor_gross,commission,net"));
    assert!(body.contains("MP-test0001"));
    assert!(body.contains("TOTAL"));
}

#[actix_web::test]
async fn settlement_payout_status_updates() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let body = json!({ "status": "processing" });
    let (status, body) =
        post_request(&token, "/settlements/ST-test0001/status", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let settlement: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(settlement["status"], "processing");
}
