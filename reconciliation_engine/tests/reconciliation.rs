use reconciliation_engine::{
    api::{ProviderResult, ReconciliationApi},
    db_types::{NewLineItem, NewOrder, OrderId, OrderStatus},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    ReconciliationDatabase,
    ReconciliationError,
    SqliteDatabase,
    StockUpdateError,
};
use spg_common::{Money, PaymentStatus};

async fn new_test_api() -> ReconciliationApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    ReconciliationApi::new(db)
}

fn success_result(txid: &str, amount: Money) -> ProviderResult {
    ProviderResult {
        provider: "paystack".to_string(),
        provider_tx_id: txid.to_string(),
        status: PaymentStatus::Success,
        amount,
        paid_at: None,
    }
}

const ORDER_UUID: &str = "9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d";

#[tokio::test]
async fn reconciling_twice_decrements_stock_once() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "259.98".parse().unwrap())
        .with_item(NewLineItem::new(1, 2, "M", "129.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();

    let result = success_result("tx-0001", Money::from_cents(25998));
    let first = api.reconcile(ORDER_UUID, &result).await.unwrap();
    assert!(first.reconciled);
    assert_eq!(first.order.status, OrderStatus::Processing);
    assert_eq!(first.order.payment_reference.as_deref(), Some("tx-0001"));
    assert!(first.partial_failures.is_empty());

    // The webhook and the verify-poll racing: same provider transaction arrives again.
    let second = api.reconcile(ORDER_UUID, &result).await.unwrap();
    assert!(!second.reconciled);
    assert_eq!(second.order.status, OrderStatus::Processing);

    let stock = api.db().fetch_stock(1, "M").await.unwrap().unwrap();
    assert_eq!(stock.quantity, 8, "stock must be decremented exactly once");
}

#[tokio::test]
async fn duplicate_with_fresh_transaction_id_is_still_a_noop() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "129.99".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "M", "129.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();

    api.reconcile(ORDER_UUID, &success_result("tx-0001", Money::from_cents(12999))).await.unwrap();
    // A provider webhook retry can carry a fresh transaction id; the order status still guards the decrement.
    let outcome = api.reconcile(ORDER_UUID, &success_result("tx-0002", Money::from_cents(12999))).await.unwrap();
    assert!(!outcome.reconciled);

    let stock = api.db().fetch_stock(1, "M").await.unwrap().unwrap();
    assert_eq!(stock.quantity, 9);
}

#[tokio::test]
async fn non_success_results_leave_the_order_untouched() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "129.99".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "M", "129.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();

    for status in [PaymentStatus::Pending, PaymentStatus::Failed] {
        let result = ProviderResult { status, ..success_result("tx-0001", Money::from_cents(12999)) };
        let outcome = api.reconcile(ORDER_UUID, &result).await.unwrap();
        assert!(!outcome.reconciled);
        assert_eq!(outcome.payment_status, status);
        assert_eq!(outcome.order.status, OrderStatus::Pending);
    }
    let stock = api.db().fetch_stock(1, "M").await.unwrap().unwrap();
    assert_eq!(stock.quantity, 10);
}

#[tokio::test]
async fn stock_decrement_clamps_at_zero() {
    let api = new_test_api().await;
    api.db().add_product(7, "Limited Hoodie", &[("XL", 1)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "1500.00".parse().unwrap())
        .with_item(NewLineItem::new(7, 3, "XL", "500.00".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();

    let outcome = api.reconcile(ORDER_UUID, &success_result("tx-0003", Money::from_cents(150000))).await.unwrap();
    assert!(outcome.reconciled);
    assert!(outcome.partial_failures.is_empty());

    let stock = api.db().fetch_stock(7, "XL").await.unwrap().unwrap();
    assert_eq!(stock.quantity, 0, "oversold inventory clamps to zero, it does not go negative");
}

#[tokio::test]
async fn a_deleted_product_does_not_block_the_rest_of_the_order() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    api.db().add_product(2, "Discontinued Cap", &[("One Size", 4)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "329.98".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "M", "129.99".parse().unwrap()))
        .with_item(NewLineItem::new(2, 1, "One Size", "199.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();
    api.db().remove_product(2).await.unwrap();

    let outcome = api.reconcile(ORDER_UUID, &success_result("tx-0004", Money::from_cents(32998))).await.unwrap();
    assert!(outcome.reconciled);
    assert_eq!(outcome.order.status, OrderStatus::Processing);
    assert_eq!(outcome.partial_failures.len(), 1);
    assert!(matches!(outcome.partial_failures[0], StockUpdateError::ProductNotFound { product_id: 2 }));

    let stock = api.db().fetch_stock(1, "M").await.unwrap().unwrap();
    assert_eq!(stock.quantity, 9, "the surviving item's stock is still decremented");
}

#[tokio::test]
async fn a_mismatched_size_label_is_skipped_not_fatal() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "129.99".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "medium", "129.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();

    let outcome = api.reconcile(ORDER_UUID, &success_result("tx-0005", Money::from_cents(12999))).await.unwrap();
    assert!(outcome.reconciled);
    assert_eq!(outcome.partial_failures.len(), 1);
    assert!(matches!(
        &outcome.partial_failures[0],
        StockUpdateError::SizeNotFound { product_id: 1, size } if size == "medium"
    ));
}

#[tokio::test]
async fn composite_references_resolve_to_the_embedded_order() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("L", 5)]).await.unwrap();
    let order = NewOrder::new(ORDER_UUID.into(), "cust-1".into(), "jo@example.com".into(), "800.00".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "L", "800.00".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();

    let key = format!("order_{ORDER_UUID}_1700000000000");
    let outcome = api.reconcile(&key, &success_result("tx-0006", Money::from_cents(80000))).await.unwrap();
    assert!(outcome.reconciled);
    assert_eq!(outcome.order.order_id, OrderId::from(ORDER_UUID));
}

#[tokio::test]
async fn stored_payment_references_resolve_after_reconciliation() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "129.99".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "M", "129.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();
    api.reconcile(ORDER_UUID, &success_result("ch_8Bq2vLkT9xWd", Money::from_cents(12999))).await.unwrap();

    // A provider-opaque token only matches via the stored payment reference.
    let order = api.order_for_key("ch_8Bq2vLkT9xWd").await.unwrap();
    assert_eq!(order.order_id, OrderId::from(ORDER_UUID));

    // And a bare order id resolves back out to the provider's own reference.
    let provider_ref = api.resolve_provider_reference(ORDER_UUID).await.unwrap();
    assert_eq!(provider_ref, "ch_8Bq2vLkT9xWd");
}

#[tokio::test]
async fn unknown_lookup_keys_are_an_error() {
    let api = new_test_api().await;
    let err = api.reconcile("no-such-order", &success_result("tx-0007", Money::from_cents(100))).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::NoOrderForKey(_)));
}

#[tokio::test]
async fn order_status_only_advances_forward() {
    let api = new_test_api().await;
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "129.99".parse().unwrap());
    api.db().insert_order(order).await.unwrap();
    let oid = OrderId::from(ORDER_UUID);

    // Cancelling a pending order is allowed.
    let cancelled = api.advance_order_status(&oid, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // But nothing moves out of Cancelled.
    let err = api.advance_order_status(&oid, OrderStatus::Processing).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::StatusTransitionForbidden { .. }));
}

#[tokio::test]
async fn shipping_flow_advances_through_the_lifecycle() {
    let api = new_test_api().await;
    api.db().add_product(1, "Classic Tee", &[("M", 10)]).await.unwrap();
    let order = NewOrder::new(OrderId::from(ORDER_UUID), "cust-1".into(), "jo@example.com".into(), "129.99".parse().unwrap())
        .with_item(NewLineItem::new(1, 1, "M", "129.99".parse().unwrap()));
    api.db().insert_order(order).await.unwrap();
    let oid = OrderId::from(ORDER_UUID);

    api.reconcile(ORDER_UUID, &success_result("tx-0008", Money::from_cents(12999))).await.unwrap();
    let shipped = api.advance_order_status(&oid, OrderStatus::Shipped).await.unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    let delivered = api.advance_order_status(&oid, OrderStatus::Delivered).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    // A delivered order can no longer be cancelled.
    let err = api.advance_order_status(&oid, OrderStatus::Cancelled).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::StatusTransitionForbidden { .. }));
}
