//! Signature and reference helpers shared by the provider clients.

use std::fmt::Write;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::{data_objects::PaymentOrder, ProviderError};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

pub fn hmac_sha256(key: &str, data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn hmac_sha512(key: &str, data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha512::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Compares two byte strings without short-circuiting, so a signature check leaks no timing information about how
/// many leading bytes matched.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Generates the correlation reference sent to a provider at initialization time: a composite token embedding the
/// order id and a millisecond timestamp, so the order can still be recovered if the provider truncates or requotes
/// the reference.
pub fn correlation_reference(order_id: &str) -> String {
    format!("order_{order_id}_{}", Utc::now().timestamp_millis())
}

/// Input validation common to every provider's `initialize`: the order total must be positive and the customer must
/// have an email address. Runs before any network call.
pub fn validate_payment_order(order: &PaymentOrder) -> Result<(), ProviderError> {
    if !order.total.is_positive() {
        return Err(ProviderError::InvalidInput(format!("Order total must be positive, got {}", order.total)));
    }
    if order.email.trim().is_empty() || !order.email.contains('@') {
        return Err(ProviderError::InvalidInput("A customer email address is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use spg_common::Money;

    use super::*;

    #[test]
    fn hex_encoding() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x0a]), "00ff0a");
    }

    #[test]
    fn constant_time_eq_compares_whole_strings() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn order_validation() {
        let mut order = PaymentOrder {
            order_id: "o-1".to_string(),
            total: Money::from_cents(12999),
            email: "jo@example.com".to_string(),
        };
        assert!(validate_payment_order(&order).is_ok());
        order.email = "not-an-email".to_string();
        assert!(matches!(validate_payment_order(&order), Err(ProviderError::InvalidInput(_))));
        order.email = "jo@example.com".to_string();
        order.total = Money::from_cents(0);
        assert!(matches!(validate_payment_order(&order), Err(ProviderError::InvalidInput(_))));
    }

    #[test]
    fn correlation_references_embed_the_order_id() {
        let reference = correlation_reference("9f1c2e34");
        assert!(reference.starts_with("order_9f1c2e34_"));
    }
}
