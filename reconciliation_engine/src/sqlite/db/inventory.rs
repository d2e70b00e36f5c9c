use sqlx::SqliteConnection;

use crate::{
    db_types::SizeStock,
    traits::{ReconciliationError, StockUpdateError},
};

/// Reduces the inventory for a product size by `quantity`, clamping at zero. The clamp lives in the statement itself
/// so a concurrent checkout racing this decrement can never drive the quantity negative.
///
/// The size label is a free-text match against the inventory table, not a foreign key, so a missing row is an
/// expected outcome; the error reports whether the product or only the size record was absent.
pub async fn decrement_stock(
    product_id: i64,
    size: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, StockUpdateError> {
    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
            UPDATE product_sizes
            SET quantity = MAX(0, quantity - $3)
            WHERE product_id = $1 AND size = $2
            RETURNING quantity;
        "#,
    )
    .bind(product_id)
    .bind(size)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;
    match remaining {
        Some(remaining) => Ok(remaining),
        None => {
            let product_exists: Option<i64> =
                sqlx::query_scalar("SELECT id FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
            match product_exists {
                Some(_) => Err(StockUpdateError::SizeNotFound { product_id, size: size.to_string() }),
                None => Err(StockUpdateError::ProductNotFound { product_id }),
            }
        },
    }
}

pub async fn fetch_stock(
    product_id: i64,
    size: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SizeStock>, ReconciliationError> {
    let stock = sqlx::query_as("SELECT * FROM product_sizes WHERE product_id = $1 AND size = $2")
        .bind(product_id)
        .bind(size)
        .fetch_optional(conn)
        .await?;
    Ok(stock)
}

/// Creates a product row. Inventory seeding lives here rather than in a public API because product management is the
/// back-office's concern; the engine only ever reads and decrements.
pub async fn insert_product(product_id: i64, name: &str, conn: &mut SqliteConnection) -> Result<(), ReconciliationError> {
    sqlx::query("INSERT OR REPLACE INTO products (id, name) VALUES ($1, $2)")
        .bind(product_id)
        .bind(name)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_stock(
    product_id: i64,
    size: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), ReconciliationError> {
    sqlx::query(
        r#"
            INSERT INTO product_sizes (product_id, size, quantity) VALUES ($1, $2, $3)
            ON CONFLICT (product_id, size) DO UPDATE SET quantity = excluded.quantity;
        "#,
    )
    .bind(product_id)
    .bind(size)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_product(product_id: i64, conn: &mut SqliteConnection) -> Result<(), ReconciliationError> {
    sqlx::query("DELETE FROM product_sizes WHERE product_id = $1").bind(product_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM products WHERE id = $1").bind(product_id).execute(conn).await?;
    Ok(())
}
