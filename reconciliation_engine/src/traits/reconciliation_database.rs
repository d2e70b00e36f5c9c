use thiserror::Error;

use crate::db_types::{LineItem, NewOrder, Order, OrderId, OrderStatus, SizeStock};

/// This trait defines the behaviour required of backends supporting the reconciliation engine.
///
/// This behaviour includes:
/// * Storing orders and their line items at checkout time.
/// * Resolving orders by id or by stored payment reference.
/// * The atomic `Pending → Processing` transition that anchors reconciliation idempotency.
/// * Clamped, per-size inventory decrements.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order and its line items in a single atomic transaction.
    ///
    /// The order is created with `Pending` status. Returns an `OrderAlreadyExists` error if an order with the same
    /// order id is already present.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, ReconciliationError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, ReconciliationError>;

    /// Fetches the order whose stored `payment_reference` matches the given string exactly.
    async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, ReconciliationError>;

    async fn fetch_line_items(&self, order: &Order) -> Result<Vec<LineItem>, ReconciliationError>;

    /// Records a successful payment against the order in a single atomic transaction:
    ///
    /// 1. Inserts the provider transaction id into the reconciliations table. A unique-constraint conflict means this
    ///    exact provider transaction has been seen before and the call returns
    ///    [`MarkPaidOutcome::AlreadyReconciled`] without touching the order.
    /// 2. Transitions the order from `Pending` to `Processing` and stores the provider transaction id as the order's
    ///    payment reference. If the order is no longer `Pending` (a webhook and a verify-poll racing, or the provider
    ///    retrying a webhook under a fresh transaction id), returns [`MarkPaidOutcome::AlreadyReconciled`].
    ///
    /// Because both steps commit together, two concurrent notifications for the same payment cannot both observe
    /// `Pending` and both trigger a stock decrement.
    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        provider_tx_id: &str,
        provider: &str,
    ) -> Result<MarkPaidOutcome, ReconciliationError>;

    /// Reduces the inventory for the given product size by `quantity`, clamping at zero rather than underflowing.
    ///
    /// Returns the remaining quantity. The error distinguishes a missing product from a missing size record so the
    /// caller can report which half of the free-text match failed.
    async fn decrement_stock(&self, product_id: i64, size: &str, quantity: i64) -> Result<i64, StockUpdateError>;

    async fn fetch_stock(&self, product_id: i64, size: &str) -> Result<Option<SizeStock>, ReconciliationError>;

    /// Sets the order status without any transition checks. Callers are expected to have validated the transition
    /// against [`OrderStatus::can_transition_to`] already; [`crate::ReconciliationApi::advance_order_status`] does.
    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order, ReconciliationError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), ReconciliationError> {
        Ok(())
    }
}

/// The result of [`ReconciliationDatabase::mark_order_paid`].
#[derive(Debug, Clone)]
pub enum MarkPaidOutcome {
    /// The order moved from `Pending` to `Processing` in this call. Stock must now be decremented, exactly once.
    Reconciled(Order),
    /// This payment signal is a duplicate. The order is returned unchanged and stock must not be touched.
    AlreadyReconciled(Order),
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No order matches the lookup key '{0}'")]
    NoOrderForKey(String),
    #[error("Order status may not change from {from} to {to}")]
    StatusTransitionForbidden { from: OrderStatus, to: OrderStatus },
}

impl From<sqlx::Error> for ReconciliationError {
    fn from(e: sqlx::Error) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}

/// A per-line-item stock update failure. These are collected, never propagated: a single bad line item must not block
/// the rest of the order's reconciliation.
#[derive(Debug, Clone, Error, serde::Serialize)]
pub enum StockUpdateError {
    #[error("Product {product_id} does not exist")]
    ProductNotFound { product_id: i64 },
    #[error("Product {product_id} has no inventory record for size '{size}'")]
    SizeNotFound { product_id: i64, size: String },
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for StockUpdateError {
    fn from(e: sqlx::Error) -> Self {
        StockUpdateError::DatabaseError(e.to_string())
    }
}
