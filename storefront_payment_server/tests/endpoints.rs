//! HTTP endpoint tests against a real sqlite database and locally-built provider clients. Nothing here talks to a
//! live provider: PayFast builds its redirect locally, and the webhook deliveries are signed by the tests themselves.

use actix_web::{test, web, App};
use anyhow::Result;
use provider_clients::{
    config::{PayfastConfig, PaystackConfig, PAYFAST_SANDBOX_URL},
    helpers::{hmac_sha512, to_hex},
    AnyProvider,
    Payfast,
    Paystack,
    ProviderId,
    PAYSTACK_SIGNATURE_HEADER,
};
use reconciliation_engine::{
    db_types::{NewLineItem, NewOrder, OrderId, OrderStatus},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::ReconciliationDatabase,
    ReconciliationApi,
    SqliteDatabase,
};
use serde_json::{json, Value};
use spg_common::{Money, Secret};
use storefront_payment_server::{
    providers::ProviderRegistry,
    routes::{health, ChargePaymentRoute, CreatePaymentRoute, PaymentSuccessRoute, VerifyPaymentRoute, WebhookRoute},
};

const ORDER_UUID: &str = "9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d";
const PAYSTACK_SECRET: &str = "sk_test_secret";

async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database")
}

fn test_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new(ProviderId::Payfast);
    let payfast_config = PayfastConfig::new(
        "10000100",
        "46f0cd694581a",
        Secret::from("test-passphrase"),
        "https://shop.test/return",
        "https://shop.test/cancel",
        "https://shop.test/payments/webhook/payfast",
    )
    .with_base_url(PAYFAST_SANDBOX_URL);
    registry.register(ProviderId::Payfast, AnyProvider::Payfast(Payfast::new(payfast_config).unwrap()));
    // An unroutable base URL: any test that reaches for the Paystack API fails fast with a transport error.
    let paystack_config =
        PaystackConfig::new("pk_test_abc", Secret::from(PAYSTACK_SECRET), "https://shop.test/thanks")
            .with_base_url("http://127.0.0.1:1");
    registry.register(ProviderId::Paystack, AnyProvider::Paystack(Paystack::new(paystack_config).unwrap()));
    registry
}

macro_rules! test_app {
    ($db:expr) => {{
        let api = ReconciliationApi::new($db.clone());
        test::init_service(
            App::new()
                .app_data(web::Data::new(api))
                .app_data(web::Data::new(test_registry()))
                .service(health)
                .service(CreatePaymentRoute::<SqliteDatabase>::new())
                .service(ChargePaymentRoute::<SqliteDatabase>::new())
                .service(VerifyPaymentRoute::<SqliteDatabase>::new())
                .service(WebhookRoute::<SqliteDatabase>::new())
                .service(PaymentSuccessRoute::<SqliteDatabase>::new()),
        )
        .await
    }};
}

async fn seed_order(db: &SqliteDatabase) -> Result<()> {
    db.add_product(5, "Waxed cotton cap", &[("L", 10), ("M", 4)]).await?;
    let order = NewOrder::new(
        OrderId::from(ORDER_UUID),
        "cust-100".to_string(),
        "alice@example.com".to_string(),
        Money::from_cents(80_000),
    )
    .with_item(NewLineItem::new(5, 2, "L", Money::from_cents(40_000)));
    db.insert_order(order).await?;
    Ok(())
}

fn paystack_success_body(reference: &str, amount_cents: i64) -> String {
    json!({
        "event": "charge.success",
        "data": {
            "id": 910_210_332,
            "status": "success",
            "reference": reference,
            "amount": amount_cents,
            "paid_at": "2024-06-01T10:00:00Z"
        }
    })
    .to_string()
}

fn sign(body: &str) -> String {
    to_hex(&hmac_sha512(PAYSTACK_SECRET, body.as_bytes()))
}

#[actix_web::test]
async fn health_check() {
    let db = new_test_db().await;
    let app = test_app!(db);
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "👍️\n".as_bytes());
}

#[actix_web::test]
async fn creating_a_payfast_payment_returns_a_locally_built_redirect() -> Result<()> {
    let db = new_test_db().await;
    seed_order(&db).await?;
    let app = test_app!(db);
    let req = test::TestRequest::post()
        .uri("/payments/create")
        .set_json(json!({ "order_id": ORDER_UUID, "provider": "payfast" }))
        .to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(response["provider"], "payfast");
    assert_eq!(response["kind"], "redirect");
    let url = response["url"].as_str().unwrap();
    assert!(url.starts_with("https://sandbox.payfast.co.za/eng/process?"));
    assert!(url.contains("amount=800.00"));
    let reference = response["reference"].as_str().unwrap();
    assert!(reference.starts_with(&format!("order_{ORDER_UUID}_")));
    Ok(())
}

#[actix_web::test]
async fn creating_a_payment_for_an_unknown_order_is_a_404() {
    let db = new_test_db().await;
    let app = test_app!(db);
    let req = test::TestRequest::post()
        .uri("/payments/create")
        .set_json(json!({ "order_id": "no-such-order", "provider": "payfast" }))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[actix_web::test]
async fn a_webhook_with_a_bad_signature_is_rejected_with_a_403() -> Result<()> {
    let db = new_test_db().await;
    seed_order(&db).await?;
    let app = test_app!(db);
    let body = paystack_success_body(&format!("order_{ORDER_UUID}_1700000000000"), 80_000);
    let req = test::TestRequest::post()
        .uri("/payments/webhook/paystack")
        .insert_header((PAYSTACK_SIGNATURE_HEADER, "0000deadbeef"))
        .set_payload(body)
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 403);
    // The order must not have been touched.
    let order = db.fetch_order_by_order_id(&OrderId::from(ORDER_UUID)).await?.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    Ok(())
}

#[actix_web::test]
async fn a_webhook_without_a_signature_header_is_rejected_with_a_403() {
    let db = new_test_db().await;
    let app = test_app!(db);
    let body = paystack_success_body("order_whatever_1700000000000", 80_000);
    let req = test::TestRequest::post().uri("/payments/webhook/paystack").set_payload(body).to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn an_unknown_provider_path_is_a_400() {
    let db = new_test_db().await;
    let app = test_app!(db);
    let req = test::TestRequest::post().uri("/payments/webhook/stripe").set_payload("{}").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[actix_web::test]
async fn a_signed_webhook_reconciles_the_order_and_replays_are_noops() -> Result<()> {
    let db = new_test_db().await;
    seed_order(&db).await?;
    let app = test_app!(db);
    let body = paystack_success_body(&format!("order_{ORDER_UUID}_1700000000000"), 80_000);
    let signature = sign(&body);
    let req = test::TestRequest::post()
        .uri("/payments/webhook/paystack")
        .insert_header((PAYSTACK_SIGNATURE_HEADER, signature.clone()))
        .set_payload(body.clone())
        .to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(response["success"], true);
    let order = db.fetch_order_by_order_id(&OrderId::from(ORDER_UUID)).await?.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment_reference.as_deref(), Some("910210332"));
    let stock = db.fetch_stock(5, "L").await?.unwrap();
    assert_eq!(stock.quantity, 8);

    // The provider retries the exact same delivery. Authenticated, acknowledged, and a no-op.
    let req = test::TestRequest::post()
        .uri("/payments/webhook/paystack")
        .insert_header((PAYSTACK_SIGNATURE_HEADER, signature))
        .set_payload(body)
        .to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(response["success"], true);
    let stock = db.fetch_stock(5, "L").await?.unwrap();
    assert_eq!(stock.quantity, 8);
    Ok(())
}

#[actix_web::test]
async fn an_event_type_the_gateway_does_not_act_on_is_acknowledged() {
    let db = new_test_db().await;
    let app = test_app!(db);
    let body = json!({ "event": "subscription.create", "data": { "code": "SUB_123" } }).to_string();
    let signature = sign(&body);
    let req = test::TestRequest::post()
        .uri("/payments/webhook/paystack")
        .insert_header((PAYSTACK_SIGNATURE_HEADER, signature))
        .set_payload(body)
        .to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(response["success"], true);
}

#[actix_web::test]
async fn an_authenticated_webhook_for_an_unknown_order_still_gets_a_200() {
    let db = new_test_db().await;
    let app = test_app!(db);
    let body = paystack_success_body("order_ffffffff-0000-0000-0000-000000000000_1700000000000", 80_000);
    let signature = sign(&body);
    let req = test::TestRequest::post()
        .uri("/payments/webhook/paystack")
        .insert_header((PAYSTACK_SIGNATURE_HEADER, signature))
        .set_payload(body)
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 200);
    let response: Value = test::read_body_json(response).await;
    assert_eq!(response["success"], false);
}

#[actix_web::test]
async fn verify_degrades_to_pending_when_the_provider_is_unreachable() -> Result<()> {
    let db = new_test_db().await;
    seed_order(&db).await?;
    let app = test_app!(db);
    let req = test::TestRequest::get()
        .uri(&format!("/payments/verify?reference={ORDER_UUID}&provider=paystack"))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 200, "a failed provider lookup must not error the polling loop");
    let response: Value = test::read_body_json(response).await;
    assert_eq!(response["payment_status"], "pending");
    assert_eq!(response["reconciled"], false);
    assert_eq!(response["order"]["order_id"], ORDER_UUID);
    Ok(())
}

#[actix_web::test]
async fn the_order_lookup_backs_the_thank_you_page() -> Result<()> {
    let db = new_test_db().await;
    seed_order(&db).await?;
    let app = test_app!(db);
    let req = test::TestRequest::get().uri(&format!("/payments/success?reference={ORDER_UUID}")).to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(response["order"]["order_id"], ORDER_UUID);
    assert_eq!(response["order"]["total_price"], "800.00");
    assert_eq!(response["items"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/payments/success?reference=no-such-order").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status().as_u16(), 404);
    Ok(())
}
