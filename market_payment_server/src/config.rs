use std::env;

use chrono::Duration;
use log::*;
use market_payment_engine::db_types::CommissionPolicy;
use mpg_common::{helpers::parse_boolean_flag, Secret};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8360;
const DEFAULT_WEBHOOK_HEADER: &str = "x-provider-signature";
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 24;
/// 15% VAT, the flat-rate fallback when no pricing service is configured.
const DEFAULT_TAX_BASIS_POINTS: i64 = 1_500;
const DEFAULT_FLAT_SHIPPING: i64 = 2_500;
const DEFAULT_COMMISSION_BPS: i64 = 250;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
    pub upstream: UpstreamConfig,
    pub vendors: VendorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPG_HOST.to_string(),
            port: DEFAULT_MPG_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            webhook: WebhookConfig::default(),
            upstream: UpstreamConfig::default(),
            vendors: VendorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = env::var("MPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPG_PORT. {e} Using the default, {DEFAULT_MPG_PORT}, instead."
                    );
                    DEFAULT_MPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPG_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let webhook = WebhookConfig::from_env_or_default();
        let upstream = UpstreamConfig::from_env_or_default();
        let vendors = VendorConfig::from_env_or_default();
        Self { host, port, database_url, auth, webhook, upstream, vendors }
    }
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify access tokens (HS256).
    pub jwt_secret: Secret<String>,
    pub token_lifetime: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT signing secret has not been set. I'm using a random value for this session. DO NOT \
             operate on production like this: every restart invalidates all issued tokens. Set MPG_JWT_SECRET \
             instead. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), token_lifetime: Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("MPG_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [MPG_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "MPG_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        let token_lifetime = env::var("MPG_JWT_LIFETIME_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS));
        Ok(Self { jwt_secret: Secret::new(secret), token_lifetime })
    }
}

//-----------------------------------------------  WebhookConfig  -----------------------------------------------------

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// Shared secret for the provider's HMAC-SHA256 webhook signatures.
    pub hmac_secret: Secret<String>,
    /// The header the provider sends the base64 signature in.
    pub hmac_header: String,
    /// If false, signature checks are skipped entirely. Local development only.
    pub hmac_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            hmac_secret: Secret::default(),
            hmac_header: DEFAULT_WEBHOOK_HEADER.to_string(),
            hmac_checks: true,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = env::var("MPG_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ MPG_WEBHOOK_SECRET is not set. Please set it to the webhook signing secret of your provider.");
            String::default()
        });
        let hmac_header = env::var("MPG_WEBHOOK_HEADER").ok().unwrap_or_else(|| DEFAULT_WEBHOOK_HEADER.to_string());
        let hmac_checks = parse_boolean_flag(env::var("MPG_WEBHOOK_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Anyone can mark orders as paid. Local use only!");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_header, hmac_checks }
    }
}

//-----------------------------------------------  UpstreamConfig  ----------------------------------------------------

/// Configuration for the external collaborators (pricing service and payment provider). A missing url means the
/// built-in local fallback is used for that collaborator.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub pricing_url: Option<String>,
    pub provider_url: Option<String>,
    pub provider_name: String,
    /// Per-request timeout for both collaborators. Each request is retried once before giving up.
    pub timeout_ms: u64,
    /// Flat-rate fallback pricing, used when no pricing service is configured.
    pub tax_basis_points: i64,
    pub flat_shipping: i64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            pricing_url: None,
            provider_url: None,
            provider_name: "localpay".to_string(),
            timeout_ms: DEFAULT_UPSTREAM_TIMEOUT_MS,
            tax_basis_points: DEFAULT_TAX_BASIS_POINTS,
            flat_shipping: DEFAULT_FLAT_SHIPPING,
        }
    }
}

impl UpstreamConfig {
    pub fn from_env_or_default() -> Self {
        let pricing_url = env::var("MPG_PRICING_URL").ok().filter(|s| !s.is_empty());
        if pricing_url.is_none() {
            info!("🪛️ MPG_PRICING_URL is not set. Using the flat-rate pricing fallback.");
        }
        let provider_url = env::var("MPG_PROVIDER_URL").ok().filter(|s| !s.is_empty());
        if provider_url.is_none() {
            info!("🪛️ MPG_PROVIDER_URL is not set. Using the local payment provider stub.");
        }
        let provider_name = env::var("MPG_PROVIDER_NAME").ok().unwrap_or_else(|| "localpay".to_string());
        let timeout_ms = env::var("MPG_UPSTREAM_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_MS);
        let tax_basis_points = env::var("MPG_TAX_BASIS_POINTS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TAX_BASIS_POINTS);
        let flat_shipping =
            env::var("MPG_FLAT_SHIPPING").ok().and_then(|s| s.parse::<i64>().ok()).unwrap_or(DEFAULT_FLAT_SHIPPING);
        Self { pricing_url, provider_url, provider_name, timeout_ms, tax_basis_points, flat_shipping }
    }
}

//------------------------------------------------  VendorConfig  -----------------------------------------------------

/// Per-vendor commission configuration. `MPG_VENDOR_COMMISSIONS` holds a JSON object mapping vendor codes to
/// commission policies, e.g. `{"acme": {"type": "percentage", "basis_points": 300}}`. Vendors not in the map get
/// the default percentage policy.
#[derive(Clone, Debug)]
pub struct VendorConfig {
    pub policies: std::collections::HashMap<String, CommissionPolicy>,
    pub default_policy: CommissionPolicy,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            policies: Default::default(),
            default_policy: CommissionPolicy::Percentage { basis_points: DEFAULT_COMMISSION_BPS },
        }
    }
}

impl VendorConfig {
    pub fn from_env_or_default() -> Self {
        let policies = env::var("MPG_VENDOR_COMMISSIONS")
            .ok()
            .and_then(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| error!("🪛️ MPG_VENDOR_COMMISSIONS is not valid JSON: {e}. Ignoring it."))
                    .ok()
            })
            .unwrap_or_default();
        let default_policy = env::var("MPG_DEFAULT_COMMISSION_BPS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|basis_points| CommissionPolicy::Percentage { basis_points })
            .unwrap_or(CommissionPolicy::Percentage { basis_points: DEFAULT_COMMISSION_BPS });
        Self { policies, default_policy }
    }
}
