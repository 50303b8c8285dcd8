//! Access token handling.
//!
//! Access tokens are HS256 JWTs signed with the `MPG_JWT_SECRET` shared secret, carried in the
//! `mpg_access_token` header. The claims identify the user (`sub`) and carry the roles granted to them. Identity
//! is established upstream (an SSO gateway in production, the test token issuer in tests); this server only
//! verifies and interprets the token.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    FromRequest,
    HttpMessage,
    HttpRequest,
};
use chrono::Utc;
use futures::future::{ok, ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use market_payment_engine::db_types::{Requester, Roles};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id. Buyers and vendors share the same namespace; a vendor's `sub` is its vendor code.
    pub sub: String,
    pub roles: Roles,
    /// Unix timestamp. Validated by the JWT library on every request.
    pub exp: i64,
}

impl JwtClaims {
    pub fn requester(&self) -> Requester {
        Requester::new(self.sub.clone(), self.roles.clone())
    }
}

/// Extracts the verified claims that [`JwtAuthMiddlewareFactory`] stored on the request. Only works on routes
/// inside an authenticated scope.
impl FromRequest for JwtClaims {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or_else(|| {
            warn!("💻️ No JWT claims found in request extensions. Is the auth middleware installed on this route?");
            ServerError::AuthenticationError(AuthError::ValidationError("No access token".to_string())).into()
        }))
    }
}

pub const ACCESS_TOKEN_HEADER: &str = "mpg_access_token";

/// Issues signed access tokens. Lives in app data so tests (and the dev login route) can mint tokens with the
/// same secret the verification middleware uses.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    lifetime: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { encoding_key, lifetime: config.token_lifetime }
    }

    pub fn issue_token(&self, sub: &str, roles: Roles) -> Result<String, ServerError> {
        let exp = (Utc::now() + self.lifetime).timestamp();
        let claims = JwtClaims { sub: sub.to_string(), roles, exp };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServerError::AuthenticationError(AuthError::ValidationError(e.to_string())))
    }
}

pub fn validate_token(token: &str, key: &DecodingKey) -> Result<JwtClaims, AuthError> {
    let data = decode::<JwtClaims>(token, key, &Validation::default())
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(data.claims)
}

//--------------------------------------  JwtAuthMiddlewareFactory  ---------------------------------------------------

/// Verifies the `mpg_access_token` header on every request in the wrapped scope and stores the decoded
/// [`JwtClaims`] in the request extensions for handlers and the ACL middleware to read.
pub struct JwtAuthMiddlewareFactory {
    decoding_key: DecodingKey,
}

impl JwtAuthMiddlewareFactory {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { decoding_key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(JwtAuthMiddlewareService { decoding_key: self.decoding_key.clone(), service: Rc::new(service) })
    }
}

pub struct JwtAuthMiddlewareService<S> {
    decoding_key: DecodingKey,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.decoding_key.clone();
        Box::pin(async move {
            let token = req
                .headers()
                .get(ACCESS_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    trace!("💻️ No access token provided");
                    ServerError::AuthenticationError(AuthError::ValidationError(
                        "No access token provided".to_string(),
                    ))
                })?
                .to_string();
            let claims = validate_token(&token, &key).map_err(|e| {
                debug!("💻️ Access token rejected. {e}");
                ServerError::AuthenticationError(e)
            })?;
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use market_payment_engine::db_types::Role;
    use mpg_common::Secret;

    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: Secret::new("test-secret-which-is-long-enough-to-pass".to_string()),
            token_lifetime: Duration::hours(1),
        }
    }

    #[test]
    fn round_trip() {
        let config = config();
        let issuer = TokenIssuer::new(&config);
        let token = issuer.issue_token("buyer-1", vec![Role::Buyer]).unwrap();
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let claims = validate_token(&token, &key).unwrap();
        assert_eq!(claims.sub, "buyer-1");
        assert_eq!(claims.roles, vec![Role::Buyer]);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = config();
        let issuer = TokenIssuer::new(&config);
        let mut token = issuer.issue_token("buyer-1", vec![Role::Buyer]).unwrap();
        token.replace_range(token.len() - 10..token.len() - 5, "00000");
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        assert!(validate_token(&token, &key).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenIssuer::new(&config());
        let token = issuer.issue_token("buyer-1", vec![Role::Buyer]).unwrap();
        let key = DecodingKey::from_secret(b"a-completely-different-secret-entirely");
        assert!(validate_token(&token, &key).is_err());
    }
}
