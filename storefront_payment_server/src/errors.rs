use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use provider_clients::ProviderError;
use reconciliation_engine::ReconciliationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Webhook signature invalid or not provided")]
    InvalidSignature,
    #[error("The payment was declined. {0}")]
    PaymentDeclined(String),
    #[error("The payment provider is not available. {0}")]
    UnknownProvider(String),
    #[error("The payment provider reported an error. {0}")]
    PaymentProviderError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::PaymentDeclined(_) => StatusCode::BAD_REQUEST,
            Self::UnknownProvider(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentProviderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::OrderNotFound(_) | ReconciliationError::NoOrderForKey(_) => {
                Self::NoRecordFound(e.to_string())
            },
            ReconciliationError::StatusTransitionForbidden { .. } => Self::InvalidRequestBody(e.to_string()),
            ReconciliationError::OrderAlreadyExists(_) => Self::InvalidRequestBody(e.to_string()),
            ReconciliationError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidInput(m) => Self::InvalidRequestBody(m),
            ProviderError::Unsupported(m) => Self::InvalidRequestBody(m),
            ProviderError::InvalidSignature => Self::InvalidSignature,
            ProviderError::QueryError { status, message } => {
                Self::PaymentDeclined(format!("Provider returned {status}: {message}"))
            },
            e => Self::PaymentProviderError(e.to_string()),
        }
    }
}
