use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::OrderId, traits::ReconciliationError};

/// Inserts an idempotency record for the given provider transaction id. Returns `false` if the transaction id has
/// been recorded before (unique-constraint conflict), in which case the caller must treat the notification as a
/// duplicate and leave the order and inventory alone.
pub async fn idempotent_insert(
    provider_tx_id: &str,
    order_id: &OrderId,
    provider: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, ReconciliationError> {
    let result = sqlx::query("INSERT INTO reconciliations (provider_tx_id, order_id, provider) VALUES ($1, $2, $3)")
        .bind(provider_tx_id)
        .bind(order_id.as_str())
        .bind(provider)
        .execute(conn)
        .await;
    match result {
        Ok(_) => {
            debug!("🗃️ Reconciliation record created for [{provider_tx_id}] against order {order_id}");
            Ok(true)
        },
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
