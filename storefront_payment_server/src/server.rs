use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use reconciliation_engine::{ReconciliationApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    providers::{build_registry, ProviderRegistry},
    routes::{health, ChargePaymentRoute, CreatePaymentRoute, PaymentSuccessRoute, VerifyPaymentRoute, WebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let providers = build_registry(&config)?;
    let srv = create_server_instance(config, db, providers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    providers: ProviderRegistry,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(providers.clone()))
            .service(health)
            .service(CreatePaymentRoute::<SqliteDatabase>::new())
            .service(ChargePaymentRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(WebhookRoute::<SqliteDatabase>::new())
            .service(PaymentSuccessRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
