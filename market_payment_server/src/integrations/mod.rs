//! Clients for the engine's external collaborators.
//!
//! Each collaborator has a remote client (HTTP, with a bounded timeout and a single retry) and a built-in local
//! fallback, selected by configuration. The local fallbacks make a fresh checkout of the server usable without
//! standing up any other service.

mod pricing;
mod provider;
mod vendors;

pub use pricing::PricingClient;
pub use provider::ProviderClient;
pub use vendors::StaticVendorPolicies;

use std::time::Duration;

use crate::errors::ServerError;

/// Delay before the single retry a remote collaborator gets.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

fn http_client(timeout_ms: u64) -> Result<reqwest::Client, ServerError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| ServerError::InitializeError(format!("Could not build the HTTP client. {e}")))
}
