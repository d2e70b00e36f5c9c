use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LineItem, NewLineItem, NewOrder, Order, OrderId, OrderStatus},
    traits::ReconciliationError,
};

/// Inserts a new order row using the given connection. This is not atomic on its own. Callers embed this inside a
/// transaction together with [`insert_line_item`] and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, ReconciliationError> {
    let d = &order.delivery;
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                email,
                total_price,
                recipient_name,
                phone,
                address_line1,
                address_line2,
                city,
                province,
                postal_code,
                instructions
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.customer_id)
    .bind(&order.email)
    .bind(order.total_price)
    .bind(&d.recipient_name)
    .bind(&d.phone)
    .bind(&d.address_line1)
    .bind(&d.address_line2)
    .bind(&d.city)
    .bind(&d.province)
    .bind(&d.postal_code)
    .bind(&d.instructions)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            ReconciliationError::OrderAlreadyExists(order.order_id.clone())
        },
        _ => ReconciliationError::from(e),
    })?;
    debug!("📝️ Order {} inserted", order.order_id);
    Ok(inserted)
}

pub async fn insert_line_item(
    order_pk: i64,
    item: &NewLineItem,
    conn: &mut SqliteConnection,
) -> Result<LineItem, ReconciliationError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, quantity, size, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_pk)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(&item.size)
    .bind(item.unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_line_items(order_pk: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_pk)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The conditional half of the idempotent reconciliation transaction. Moves the order from `Pending` to `Processing`
/// and stores the provider transaction id, in a single statement whose `WHERE status = 'Pending'` guard makes the
/// read-check-write atomic at the row level. Returns `None` when the order was not `Pending` (or does not exist).
pub async fn try_mark_processing(
    order_id: &OrderId,
    provider_tx_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = 'Processing', payment_reference = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(provider_tx_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn update_order_status(
    order_id: &OrderId,
    status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, ReconciliationError> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
    Ok(order)
}
