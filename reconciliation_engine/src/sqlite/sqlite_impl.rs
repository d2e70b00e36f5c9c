//! `SqliteDatabase` is a concrete implementation of a reconciliation engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`ReconciliationDatabase`] trait.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, inventory, new_pool, orders, reconciliations};
use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatus, SizeStock},
    traits::{MarkPaidOutcome, ReconciliationDatabase, ReconciliationError, StockUpdateError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database instance, using the `SPG_DATABASE_URL` environment variable for the URL.
    pub async fn new(max_connections: u32) -> Result<Self, ReconciliationError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, ReconciliationError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Seeds a product and its per-size inventory. Product management proper is out of the engine's scope; this
    /// exists for deployment seeding and tests.
    pub async fn add_product(
        &self,
        product_id: i64,
        name: &str,
        sizes: &[(&str, i64)],
    ) -> Result<(), ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        inventory::insert_product(product_id, name, &mut tx).await?;
        for (size, quantity) in sizes {
            inventory::set_stock(product_id, size, *quantity, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_product(&self, product_id: i64) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        inventory::delete_product(product_id, &mut conn).await
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(&order, &mut tx).await?;
        for item in &order.items {
            orders::insert_line_item(inserted.id, item, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", inserted.order_id, inserted.id);
        Ok(inserted)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_reference(reference, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_line_items(&self, order: &Order) -> Result<Vec<LineItem>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_line_items(order.id, &mut conn).await?;
        Ok(items)
    }

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        provider_tx_id: &str,
        provider: &str,
    ) -> Result<MarkPaidOutcome, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let inserted = reconciliations::idempotent_insert(provider_tx_id, order_id, provider, &mut tx).await?;
        if !inserted {
            tx.rollback().await?;
            debug!("🗃️ Provider transaction [{provider_tx_id}] has already been reconciled.");
            let order = self
                .fetch_order_by_order_id(order_id)
                .await?
                .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
            return Ok(MarkPaidOutcome::AlreadyReconciled(order));
        }
        let updated = orders::try_mark_processing(order_id, provider_tx_id, &mut tx).await?;
        match updated {
            Some(order) => {
                tx.commit().await?;
                debug!("🗃️ Order {order_id} moved to Processing, payment reference [{provider_tx_id}] stored.");
                Ok(MarkPaidOutcome::Reconciled(order))
            },
            None => {
                // The order was not Pending. Keep the idempotency record (the provider tx id has still been seen),
                // but report the duplicate.
                let order = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
                match order {
                    Some(order) => {
                        tx.commit().await?;
                        Ok(MarkPaidOutcome::AlreadyReconciled(order))
                    },
                    None => {
                        tx.rollback().await?;
                        Err(ReconciliationError::OrderNotFound(order_id.clone()))
                    },
                }
            },
        }
    }

    async fn decrement_stock(&self, product_id: i64, size: &str, quantity: i64) -> Result<i64, StockUpdateError> {
        let mut conn =
            self.pool.acquire().await.map_err(|e| StockUpdateError::DatabaseError(e.to_string()))?;
        inventory::decrement_stock(product_id, size, quantity, &mut conn).await
    }

    async fn fetch_stock(&self, product_id: i64, size: &str) -> Result<Option<SizeStock>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_stock(product_id, size, &mut conn).await
    }

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), ReconciliationError> {
        self.pool.close().await;
        Ok(())
    }
}
