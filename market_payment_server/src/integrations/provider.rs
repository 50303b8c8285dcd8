use log::*;
use market_payment_engine::{
    db_types::OrderId,
    traits::{CollaboratorError, PaymentProvider, ProviderIntent},
};
use mpg_common::Money;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Serialize;

use super::{http_client, RETRY_BACKOFF};
use crate::{config::UpstreamConfig, errors::ServerError};

/// The payment provider collaborator. Remote when `MPG_PROVIDER_URL` is set, otherwise a local stub that mints
/// provider references without talking to anyone. The stub pairs with the `dev-tools` confirmation endpoint for
/// an end-to-end payment flow on a laptop.
#[derive(Clone)]
pub enum ProviderClient {
    Remote(RemoteProvider),
    Local(LocalProvider),
}

impl ProviderClient {
    pub fn try_new(config: &UpstreamConfig) -> Result<Self, ServerError> {
        match &config.provider_url {
            Some(url) => Ok(Self::Remote(RemoteProvider::try_new(url, &config.provider_name, config.timeout_ms)?)),
            None => Ok(Self::Local(LocalProvider::new(&config.provider_name))),
        }
    }
}

impl PaymentProvider for ProviderClient {
    fn name(&self) -> &str {
        match self {
            Self::Remote(remote) => remote.name(),
            Self::Local(local) => local.name(),
        }
    }

    async fn register_intent(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderIntent, CollaboratorError> {
        match self {
            Self::Remote(remote) => remote.register_intent(order_id, amount, currency).await,
            Self::Local(local) => local.register_intent(order_id, amount, currency).await,
        }
    }
}

//----------------------------------------------  RemoteProvider  -----------------------------------------------------

#[derive(Serialize)]
struct RegisterIntentRequest<'a> {
    order_id: &'a OrderId,
    amount: Money,
    currency: &'a str,
}

#[derive(Clone)]
pub struct RemoteProvider {
    client: reqwest::Client,
    url: String,
    name: String,
}

impl RemoteProvider {
    pub fn try_new(url: &str, name: &str, timeout_ms: u64) -> Result<Self, ServerError> {
        Ok(Self { client: http_client(timeout_ms)?, url: url.to_string(), name: name.to_string() })
    }

    async fn post_intent(&self, request: &RegisterIntentRequest<'_>) -> Result<ProviderIntent, reqwest::Error> {
        self.client.post(&self.url).json(request).send().await?.error_for_status()?.json::<ProviderIntent>().await
    }
}

impl PaymentProvider for RemoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register_intent(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderIntent, CollaboratorError> {
        let request = RegisterIntentRequest { order_id, amount, currency };
        let first = match self.post_intent(&request).await {
            Ok(intent) => return Ok(intent),
            Err(e) => e,
        };
        if first.is_status() {
            return Err(CollaboratorError::Rejected(first.to_string()));
        }
        debug!("📞️ Payment provider call failed ({first}). Retrying once.");
        tokio::time::sleep(RETRY_BACKOFF).await;
        match self.post_intent(&request).await {
            Ok(intent) => Ok(intent),
            Err(e) if e.is_status() => Err(CollaboratorError::Rejected(e.to_string())),
            Err(e) => {
                warn!("📞️ Payment provider is unavailable. {e}");
                Err(CollaboratorError::Unavailable(e.to_string()))
            },
        }
    }
}

//-----------------------------------------------  LocalProvider  -----------------------------------------------------

#[derive(Clone)]
pub struct LocalProvider {
    name: String,
}

impl LocalProvider {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl PaymentProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register_intent(
        &self,
        order_id: &OrderId,
        _amount: Money,
        _currency: &str,
    ) -> Result<ProviderIntent, CollaboratorError> {
        let client_secret = thread_rng().sample_iter(&Alphanumeric).take(24).map(char::from).collect::<String>();
        Ok(ProviderIntent { provider_ref: format!("local_{order_id}"), client_secret })
    }
}
