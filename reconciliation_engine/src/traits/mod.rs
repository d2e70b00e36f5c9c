//! Behaviour required of a reconciliation backend.

mod reconciliation_database;

pub use reconciliation_database::{
    MarkPaidOutcome,
    ReconciliationDatabase,
    ReconciliationError,
    StockUpdateError,
};
