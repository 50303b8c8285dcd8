use actix_web::{http::StatusCode, web, web::ServiceConfig};
use market_payment_engine::{
    db_types::{Cart, CartItem, FulfillmentStatus, Role},
    order_objects::{OrderSearchResult, SortOrder},
    CartApi,
    OrderFlowApi,
};
use mpg_common::Money;
use serde_json::json;

use super::{
    helpers::{delete_request, get_request, issue_token, post_request},
    mocks::{order, order_item, MockMarketDb, StubPricing},
};
use crate::routes::{
    AddCartItemRoute,
    CheckoutRoute,
    MyCartRoute,
    MyOrdersRoute,
    OrderByIdRoute,
    RemoveCartItemRoute,
    UpdateFulfillmentRoute,
};

fn cart() -> Cart {
    let items = vec![CartItem {
        sku: "WIDGET".to_string(),
        quantity: 2,
        unit_price: Money::from(5_000),
        vendor_code: "acme".to_string(),
    }];
    Cart { buyer_id: "buyer-1".to_string(), items, subtotal: Money::from(10_000) }
}

fn configure_cart(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_fetch_cart().returning(|_| Ok(cart()));
    db.expect_upsert_cart_item().returning(|_, _| Ok(cart()));
    db.expect_remove_cart_item().returning(|_, _| Ok(Cart::empty("buyer-1")));
    let api = CartApi::new(db);
    cfg.service(MyCartRoute::<MockMarketDb>::new())
        .service(AddCartItemRoute::<MockMarketDb>::new())
        .service(RemoveCartItemRoute::<MockMarketDb>::new())
        .app_data(web::Data::new(api));
}

fn configure_orders(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_fetch_cart().returning(|_| Ok(cart()));
    db.expect_checkout_cart().returning(|_, _| Ok(order("MP-test0001", "buyer-1")));
    db.expect_fetch_order_by_order_id().returning(|_| Ok(Some(order("MP-test0001", "buyer-1"))));
    db.expect_fetch_order_items().returning(|_| Ok(vec![order_item("MP-test0001", "WIDGET", "acme")]));
    db.expect_search_orders()
        .withf(|q| q.buyer_id.as_deref() == Some("buyer-1"))
        .returning(|q| Ok(OrderSearchResult { total: 1, page: q.pagination.page, limit: q.pagination.limit, orders: vec![order("MP-test0001", "buyer-1")] }));
    let mut updated = order("MP-test0001", "buyer-1");
    updated.fulfillment_status = FulfillmentStatus::Processing;
    db.expect_update_fulfillment_status().returning(move |_, _| Ok(updated.clone()));
    let api = OrderFlowApi::new(db, StubPricing);
    cfg.service(CheckoutRoute::<MockMarketDb, StubPricing>::new())
        .service(MyOrdersRoute::<MockMarketDb, StubPricing>::new())
        .service(OrderByIdRoute::<MockMarketDb, StubPricing>::new())
        .service(UpdateFulfillmentRoute::<MockMarketDb, StubPricing>::new())
        .app_data(web::Data::new(api));
}

fn configure_search(cfg: &mut ServiceConfig) {
    let mut db = MockMarketDb::new();
    db.expect_search_orders()
        .withf(|q| {
            q.search.as_deref() == Some("WIDGET") &&
                q.sort_order == SortOrder::Desc &&
                q.since.is_some() &&
                q.pagination.limit == 5
        })
        .returning(|q| {
            Ok(OrderSearchResult {
                total: 1,
                page: q.pagination.page,
                limit: q.pagination.limit,
                orders: vec![order("MP-test0001", "buyer-1")],
            })
        });
    let api = OrderFlowApi::new(db, StubPricing);
    cfg.service(MyOrdersRoute::<MockMarketDb, StubPricing>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn fetch_my_cart_no_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/cart", configure_cart).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. Access token is invalid. No access token provided");
}

#[actix_web::test]
async fn fetch_my_cart_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token("buyer-1", vec![Role::Buyer]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let err = get_request(&token, "/cart", configure_cart).await.expect_err("Expected error");
    assert!(err.contains("Access token is invalid"), "unexpected error: {err}");
}

#[actix_web::test]
async fn fetch_my_cart() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let (status, body) = get_request(&token, "/cart", configure_cart).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let cart: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(cart["buyer_id"], "buyer-1");
    assert_eq!(cart["items"][0]["sku"], "WIDGET");
    assert_eq!(cart["subtotal"], 10_000);
}

#[actix_web::test]
async fn add_item_to_cart() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let body = json!({ "sku": "WIDGET", "quantity": 2, "unit_price": 5000, "vendor_code": "acme" });
    let (status, body) = post_request(&token, "/cart/items", body, configure_cart).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("WIDGET"));
}

#[actix_web::test]
async fn remove_item_from_cart() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let (status, body) = delete_request(&token, "/cart/items/WIDGET", configure_cart).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let cart: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn checkout_creates_an_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let body = json!({ "shipping_address": { "line1": "1 King Fahd Rd", "city": "Riyadh" } });
    let (status, body) = post_request(&token, "/orders", body, configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["ok"], true);
    assert_eq!(response["id"], "MP-test0001");
}

#[actix_web::test]
async fn my_orders_are_scoped_to_the_caller() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let (status, body) = get_request(&token, "/orders", configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["total"], 1);
    assert_eq!(result["items"][0]["buyer_id"], "buyer-1");
}

#[actix_web::test]
async fn order_search_uses_query_parameters() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let path = "/orders?q=WIDGET&sort=desc&limit=5&from=2024-01-01T00:00:00Z";
    let (status, body) = get_request(&token, path, configure_search).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["total"], 1);
    assert_eq!(result["items"][0]["order_id"], "MP-test0001");
}

#[actix_web::test]
async fn strangers_cannot_read_another_buyers_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-2", vec![Role::Buyer]);
    let err = get_request(&token, "/orders/MP-test0001", configure_orders).await.expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "unexpected error: {err}");
}

#[actix_web::test]
async fn admins_can_read_any_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("back-office", vec![Role::Admin]);
    let (status, body) = get_request(&token, "/orders/MP-test0001", configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["ok"], true);
    assert_eq!(response["item"]["order_id"], "MP-test0001");
    assert_eq!(response["line_items"][0]["sku"], "WIDGET");
}

#[actix_web::test]
async fn buyers_cannot_update_fulfillment() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("buyer-1", vec![Role::Buyer]);
    let body = json!({ "status": "processing" });
    let err = post_request(&token, "/orders/MP-test0001/fulfillment", body, configure_orders)
        .await
        .expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn vendors_update_fulfillment() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("acme", vec![Role::Vendor]);
    let body = json!({ "status": "processing" });
    let (status, body) = post_request(&token, "/orders/MP-test0001/fulfillment", body, configure_orders)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["fulfillment_status"], "processing");
}

#[actix_web::test]
async fn vendors_cannot_touch_other_vendors_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("globex", vec![Role::Vendor]);
    let body = json!({ "status": "processing" });
    let err = post_request(&token, "/orders/MP-test0001/fulfillment", body, configure_orders)
        .await
        .expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "unexpected error: {err}");
}
