//! Payment provider clients.
//!
//! Each supported payment provider gets one client that isolates all of that provider's HTTP contract details
//! (auth headers, endpoint shapes, amount units, signature schemes) behind the [`PaymentProvider`] trait:
//!
//! * [`Paystack`] — redirect flow; integer minor-unit amounts; HMAC-SHA512 (hex) webhook signatures.
//! * [`Yoco`] — in-browser tokenization with a synchronous charge call; HMAC-SHA256 (base64) webhook signatures.
//! * [`Payfast`] — locally-built redirect with no network call; major-unit decimal amounts on the wire;
//!   HMAC-SHA256 (hex) ITN signatures.
//!
//! Webhook payloads are authenticated over the *raw, unparsed* request body, with a constant-time comparison,
//! before any JSON parsing takes place.

pub mod config;
pub mod data_objects;
pub mod error;
pub mod helpers;

mod payfast;
mod paystack;
mod provider;
mod yoco;

pub use error::ProviderError;
pub use payfast::{Payfast, PAYFAST_SIGNATURE_HEADER};
pub use paystack::{Paystack, PAYSTACK_SIGNATURE_HEADER};
pub use provider::{AnyProvider, PaymentProvider, ProviderId};
pub use yoco::{Yoco, YOCO_SIGNATURE_HEADER};
