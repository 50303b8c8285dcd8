use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::Duration;
use market_payment_engine::db_types::Roles;
use mpg_common::Secret;

use crate::{
    auth::{JwtAuthMiddlewareFactory, TokenIssuer, ACCESS_TOKEN_HEADER},
    config::AuthConfig,
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Secret::new("test-only-secret-0123456789abcdefghijklmn".to_string()),
        token_lifetime: Duration::hours(1),
    }
}

pub fn issue_token(sub: &str, roles: Roles) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(sub, roles).expect("Failed to sign token")
}

pub async fn get_request(
    auth_header: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send_request(TestRequest::get().uri(path), auth_header, configure).await
}

pub async fn post_request(
    auth_header: &str,
    path: &str,
    body: serde_json::Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send_request(TestRequest::post().uri(path).set_json(body), auth_header, configure).await
}

pub async fn delete_request(
    auth_header: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send_request(TestRequest::delete().uri(path), auth_header, configure).await
}

async fn send_request(
    mut req: TestRequest,
    auth_header: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    if !auth_header.is_empty() {
        req = req.insert_header((ACCESS_TOKEN_HEADER, auth_header));
    }
    let req = req.to_request();
    let app = App::new().wrap(JwtAuthMiddlewareFactory::new(&get_auth_config())).configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let bytes = res.into_body().try_into_bytes().map_err(|_| "Could not read response body".to_string())?;
    Ok((status, String::from_utf8_lossy(&bytes).into_owned()))
}
