//! # Market Payment Server
//! This module hosts the HTTP surface of the marketplace payment gateway. It is responsible for:
//! Authenticating callers and enforcing role-based access.
//! Translating HTTP requests into engine API calls for carts, orders, payments and settlements.
//! Receiving and verifying signed webhook events from the payment provider.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! All authenticated routes live under the `/market` scope and require an access token in the
//! `mpg_access_token` header. The provider webhook lives at `/market/payments/webhook` and is authenticated by
//! its HMAC signature instead. `/health` is open and returns a 200 OK response.

pub mod auth;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
