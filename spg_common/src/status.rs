use std::{fmt, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The normalized outcome of a provider-side payment, shared between the provider clients and the reconciliation
/// engine. A `Pending` or `Failed` payment is a valid result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Pending,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct InvalidPaymentStatus(String);

impl FromStr for PaymentStatus {
    type Err = InvalidPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            s => Err(InvalidPaymentStatus(s.to_string())),
        }
    }
}

impl PaymentStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentStatus::Success)
    }
}
