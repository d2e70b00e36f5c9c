use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Malformed order or user data supplied before any network call. Always recoverable; surfaced as a 400.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A provider lookup failed at the transport level. Recoverable: callers fall back to treating the payment as
    /// still pending rather than erroring the user-facing flow.
    #[error("Could not verify transaction with the provider: {0}")]
    Verification(String),
    /// Webhook signature mismatch. Fatal for that single delivery; must be raised before the body is parsed.
    #[error("Webhook signature is invalid")]
    InvalidSignature,
    #[error("Could not parse provider response: {0}")]
    Json(String),
    #[error("Could not initialize provider client: {0}")]
    Initialization(String),
    #[error("Provider returned an error: {status} {message}")]
    QueryError { status: u16, message: String },
    #[error("{0}")]
    Unsupported(String),
}
