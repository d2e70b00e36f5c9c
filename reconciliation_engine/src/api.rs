//! The reconciliation API.
//!
//! [`ReconciliationApi`] is the single place where a "payment succeeded" signal is turned into order-state changes
//! and inventory changes, regardless of whether the signal arrived via an asynchronous provider webhook or a
//! synchronous verify-poll from the storefront.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde::Serialize;
use spg_common::{Money, PaymentStatus};

use crate::{
    db_types::{LineItem, Order, OrderId, OrderStatus},
    reference::ParsedReference,
    traits::{MarkPaidOutcome, ReconciliationDatabase, ReconciliationError, StockUpdateError},
};

/// A normalized provider-side payment result, as produced by a webhook event or a verify call.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub provider: String,
    pub provider_tx_id: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
}

/// The outcome of a reconciliation attempt.
///
/// Per-line-item stock failures are carried here rather than only appearing in logs, so callers can surface partial
/// completion for observability.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutcome {
    pub order: Order,
    pub payment_status: PaymentStatus,
    /// True only when this call performed the `Pending → Processing` transition. A duplicate notification reports
    /// success with `reconciled == false`.
    pub reconciled: bool,
    pub partial_failures: Vec<StockUpdateError>,
}

pub struct ReconciliationApi<B> {
    db: B,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationDatabase
{
    /// Turns a provider-reported payment outcome into authoritative order-state and inventory changes.
    ///
    /// The lookup key may be an order id, a composite `order_<id>_<millis>` reference, or a provider-issued token
    /// that was stored as the order's payment reference. Resolution order: direct lookup by order id, then lookup by
    /// stored payment reference, then the order id embedded in a composite reference.
    ///
    /// A non-success provider status is not an error: the order is returned unchanged and the status is surfaced to
    /// the caller. A duplicate success signal is a no-op success; stock is decremented at most once per order
    /// (enforced transactionally by [`ReconciliationDatabase::mark_order_paid`]).
    ///
    /// The order-status update and the stock decrements are deliberately not transactional with each other: a failed
    /// line-item update never aborts reconciliation, and the failures are reported in
    /// [`ReconciliationOutcome::partial_failures`].
    pub async fn reconcile(
        &self,
        lookup_key: &str,
        result: &ProviderResult,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let order = self.resolve_order(lookup_key).await?;
        if !result.status.is_success() {
            debug!(
                "🔄️💰️ Payment [{}] for order {} reports status '{}'. Leaving the order untouched.",
                result.provider_tx_id, order.order_id, result.status
            );
            return Ok(ReconciliationOutcome {
                order,
                payment_status: result.status,
                reconciled: false,
                partial_failures: Vec::new(),
            });
        }
        if result.amount != order.total_price {
            warn!(
                "🔄️💰️ Provider {} reports {} for order {}, but the order total is {}. Reconciling anyway.",
                result.provider, result.amount, order.order_id, order.total_price
            );
        }
        match self.db.mark_order_paid(&order.order_id, &result.provider_tx_id, &result.provider).await? {
            MarkPaidOutcome::Reconciled(order) => {
                info!("🔄️💰️ Order {} reconciled against [{}]. Decrementing stock.", order.order_id, result.provider_tx_id);
                let items = self.db.fetch_line_items(&order).await?;
                let partial_failures = self.decrement_stock(&items).await;
                if !partial_failures.is_empty() {
                    warn!(
                        "🔄️💰️ Order {} reconciled with {} of {} line items failing their stock update.",
                        order.order_id,
                        partial_failures.len(),
                        items.len()
                    );
                }
                Ok(ReconciliationOutcome { order, payment_status: PaymentStatus::Success, reconciled: true, partial_failures })
            },
            MarkPaidOutcome::AlreadyReconciled(order) => {
                info!(
                    "🔄️💰️ Duplicate payment notification [{}] for order {}. No-op.",
                    result.provider_tx_id, order.order_id
                );
                Ok(ReconciliationOutcome {
                    order,
                    payment_status: PaymentStatus::Success,
                    reconciled: false,
                    partial_failures: Vec::new(),
                })
            },
        }
    }

    /// Reduces inventory for each line item of a reconciled order. Never fails as a whole: individual lookup or
    /// update failures are logged, collected and returned, and the remaining items are still processed.
    pub async fn decrement_stock(&self, items: &[LineItem]) -> Vec<StockUpdateError> {
        let mut failures = Vec::new();
        for item in items {
            match self.db.decrement_stock(item.product_id, &item.size, item.quantity).await {
                Ok(remaining) => {
                    debug!(
                        "🔄️📦️ Stock for product {} size '{}' reduced by {}. {remaining} remaining.",
                        item.product_id, item.size, item.quantity
                    );
                },
                Err(e) => {
                    warn!("🔄️📦️ Skipping stock update for product {} size '{}'. {e}", item.product_id, item.size);
                    failures.push(e);
                },
            }
        }
        failures
    }

    /// Resolves an ambiguous reference to the string that should be presented to the provider's transaction-lookup
    /// API. If the reference is a bare order id and the order carries a stored payment reference, the stored
    /// reference is returned, since the provider only recognizes its own issued reference.
    pub async fn resolve_provider_reference(&self, reference: &str) -> Result<String, ReconciliationError> {
        if let ParsedReference::Raw(order_id) = ParsedReference::parse(reference) {
            if let Some(order) = self.db.fetch_order_by_order_id(&order_id).await? {
                if let Some(stored) = order.payment_reference {
                    debug!("🔄️🔍️ Resolved bare order id {order_id} to stored payment reference.");
                    return Ok(stored);
                }
            }
        }
        Ok(reference.to_string())
    }

    /// Fetches the order a lookup key refers to, without mutating anything. Used by the thank-you page and the
    /// verify-poll fallback path.
    pub async fn order_for_key(&self, lookup_key: &str) -> Result<Order, ReconciliationError> {
        self.resolve_order(lookup_key).await
    }

    /// Advances an order along the documented lifecycle (`Pending → Processing → Shipped → Delivered`, or
    /// `Pending → Cancelled`). Any other transition is rejected.
    pub async fn advance_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, ReconciliationError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
        if !order.status.can_transition_to(new_status) {
            return Err(ReconciliationError::StatusTransitionForbidden { from: order.status, to: new_status });
        }
        self.db.update_order_status(order_id, new_status).await
    }

    async fn resolve_order(&self, lookup_key: &str) -> Result<Order, ReconciliationError> {
        if let Some(order) = self.db.fetch_order_by_order_id(&OrderId::from(lookup_key)).await? {
            return Ok(order);
        }
        if let Some(order) = self.db.fetch_order_by_payment_reference(lookup_key).await? {
            return Ok(order);
        }
        if let ParsedReference::Composite { order_id, .. } = ParsedReference::parse(lookup_key) {
            if let Some(order) = self.db.fetch_order_by_order_id(&order_id).await? {
                return Ok(order);
            }
        }
        Err(ReconciliationError::NoOrderForKey(lookup_key.to_string()))
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
