//! Storefront reconciliation engine
//!
//! This library holds the core logic for turning a provider-reported payment outcome into authoritative order-state
//! and inventory changes. It is provider-agnostic: the HTTP clients for the individual payment providers live in the
//! `provider_clients` crate, and the HTTP surface lives in `storefront_payment_server`.
//!
//! The library is divided into two main sections:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend. You should never need to access the
//!    database directly; use the [`ReconciliationApi`] instead. The exception is the data types used in the database,
//!    which are defined in the [`db_types`] module and are public.
//! 2. The reconciliation API ([`ReconciliationApi`]). This is the single place where a "payment succeeded" signal,
//!    regardless of whether it arrived via a webhook or a verify-poll, becomes an order-status transition and a set
//!    of per-line-item stock decrements.

pub mod api;
pub mod db_types;
pub mod reference;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use api::{ProviderResult, ReconciliationApi, ReconciliationOutcome};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{MarkPaidOutcome, ReconciliationDatabase, ReconciliationError, StockUpdateError};
