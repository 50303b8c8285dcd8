use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use market_payment_engine::traits::{CartError, CollaboratorError, MarketError, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error. {0}")]
    CouldNotDeserializePayload(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("Invalid webhook signature. {0}")]
    InvalidSignature(String),
    #[error("An upstream service is unavailable. {0}")]
    UpstreamUnavailable(String),
}

impl ServerError {
    /// The machine-readable error kind in the JSON envelope. Clients branch on this, not on the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CouldNotDeserializePayload(_) | Self::InvalidRequestBody(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NoRecordFound(_) => "not_found",
            Self::InsufficientPermissions(_) | Self::AuthenticationError(_) => "forbidden",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => "internal",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = serde_json::json!({ "ok": false, "error": self.to_string(), "kind": self.kind() }).to_string();
        let mut builder = HttpResponse::build(self.status_code());
        builder.insert_header(ContentType::json());
        if matches!(self, Self::UpstreamUnavailable(_)) {
            builder.insert_header(("Retry-After", "5"));
        }
        builder.body(body)
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
}

impl From<MarketError> for ServerError {
    fn from(e: MarketError) -> Self {
        match e {
            MarketError::EmptyCart(_) | MarketError::InvalidAddress(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            MarketError::OrderNotFound(_) | MarketError::IntentNotFound(_) => Self::NoRecordFound(e.to_string()),
            MarketError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
            MarketError::OrderNotPending(_) | MarketError::IntentAlreadyActive(_) | MarketError::InvalidTransition { .. } => {
                Self::Conflict(e.to_string())
            },
            MarketError::Upstream(CollaboratorError::Unavailable(msg)) => Self::UpstreamUnavailable(msg),
            MarketError::Upstream(CollaboratorError::Rejected(msg)) => Self::InvalidRequestBody(msg),
            MarketError::Cart(CartError::InvalidQuantity(q)) => {
                Self::InvalidRequestBody(format!("Quantity must be a positive integer, got {q}"))
            },
            MarketError::Settlement(SettlementError::SettlementNotFound(_)) => Self::NoRecordFound(e.to_string()),
            MarketError::Settlement(SettlementError::InvalidStatusChange { .. }) => Self::Conflict(e.to_string()),
            MarketError::DatabaseError(_) |
            MarketError::Cart(CartError::DatabaseError(_)) |
            MarketError::Query(_) |
            MarketError::Settlement(SettlementError::DatabaseError(_)) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CartError> for ServerError {
    fn from(e: CartError) -> Self {
        MarketError::from(e).into()
    }
}
