//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every handler that talks to a provider or the database is async; the worker threads interleave requests while the
//! network and sqlite calls are in flight.

use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use provider_clients::{data_objects::PaymentOrder, PaymentProvider, ProviderError, ProviderId};
use reconciliation_engine::{traits::ReconciliationDatabase, ReconciliationApi};
use spg_common::PaymentStatus;

use crate::{
    data_objects::{
        provider_result_from_event,
        provider_result_from_verify,
        webhook_lookup_key,
        ChargeRequest,
        CreatePaymentRequest,
        JsonResponse,
        PaymentInitiated,
        SuccessQuery,
        VerifyQuery,
        VerifyResponse,
    },
    errors::ServerError,
    providers::{signature_header, ProviderRegistry},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Create payment  ---------------------------------------------
route!(create_payment => Post "/payments/create" impl ReconciliationDatabase);
/// Initializes a payment for an existing order with the requested (or default) provider.
///
/// Nothing on the backend changes here. The response carries the correlation reference and either a redirect URL or
/// the public key for the provider's in-browser tokenization widget.
pub async fn create_payment<B: ReconciliationDatabase>(
    body: web::Json<CreatePaymentRequest>,
    api: web::Data<ReconciliationApi<B>>,
    providers: web::Data<ProviderRegistry>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST create payment for order {}", request.order_id);
    let order = api.order_for_key(&request.order_id).await?;
    let provider = providers.get(request.provider)?;
    let payment_order = PaymentOrder {
        order_id: order.order_id.as_str().to_string(),
        total: order.total_price,
        email: order.email.clone(),
    };
    let payment = provider.initialize(&payment_order).await?;
    let result = PaymentInitiated {
        provider: provider.name().to_string(),
        order_id: order.order_id.as_str().to_string(),
        payment,
    };
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Charge  ------------------------------------------------------
route!(charge_payment => Post "/payments/charge" impl ReconciliationDatabase);
/// Charges a one-time card token synchronously and reconciles the order in the same request.
///
/// A provider status other than success is reported as a 400 so the storefront can prompt for another card. The
/// token is single-use, so a retry requires a fresh tokenization round.
pub async fn charge_payment<B: ReconciliationDatabase>(
    body: web::Json<ChargeRequest>,
    api: web::Data<ReconciliationApi<B>>,
    providers: web::Data<ProviderRegistry>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST charge for order {}", request.order_id);
    let order = api.order_for_key(&request.order_id).await?;
    // Tokenized charges are a Yoco flow, so that is the fallback when no provider is named.
    let provider = providers.get(Some(request.provider.unwrap_or(ProviderId::Yoco)))?;
    let payment_order = PaymentOrder {
        order_id: order.order_id.as_str().to_string(),
        total: order.total_price,
        email: order.email.clone(),
    };
    let result = provider.charge(&request.token, &payment_order).await?;
    if result.status != PaymentStatus::Success {
        return Err(ServerError::PaymentDeclined(format!(
            "{} reports '{}' for charge {}.",
            provider.name(),
            result.status,
            result.provider_tx_id
        )));
    }
    let provider_result = provider_result_from_verify(&result);
    let outcome = api.reconcile(&result.reference, &provider_result).await?;
    Ok(HttpResponse::Ok().json(VerifyResponse::from_outcome(outcome)))
}

//----------------------------------------------   Verify  ------------------------------------------------------
route!(verify_payment => Get "/payments/verify" impl ReconciliationDatabase);
/// Polls the provider for the payment's status and reconciles the order if the payment succeeded.
///
/// This is the active half of the webhook/verify race: whichever signal arrives first reconciles the order, and the
/// other becomes a no-op. A provider lookup failure (network trouble, or a transaction the provider does not know
/// yet) degrades to a pending report with a 200 rather than erroring the storefront's polling loop.
pub async fn verify_payment<B: ReconciliationDatabase>(
    query: web::Query<VerifyQuery>,
    api: web::Data<ReconciliationApi<B>>,
    providers: web::Data<ProviderRegistry>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET verify for reference {}", query.reference);
    let provider = providers.get(query.provider)?;
    let reference = api.resolve_provider_reference(&query.reference).await?;
    let result = match provider.verify(&reference).await {
        Ok(result) => result,
        Err(e @ ProviderError::Verification(_)) | Err(e @ ProviderError::Json(_)) => {
            warn!("💻️ Could not verify '{reference}' with {}. {e}", provider.name());
            let order = api.order_for_key(&query.reference).await.ok();
            let response =
                VerifyResponse::pending(order, "The payment could not be verified yet. Try again shortly.");
            return Ok(HttpResponse::Ok().json(response));
        },
        Err(e) => return Err(e.into()),
    };
    if !result.status.is_success() {
        let order = api.order_for_key(&query.reference).await.ok();
        let response = VerifyResponse {
            payment_status: result.status,
            reconciled: false,
            order,
            partial_failures: Vec::new(),
            message: None,
        };
        return Ok(HttpResponse::Ok().json(response));
    }
    let provider_result = provider_result_from_verify(&result);
    let outcome = api.reconcile(&result.reference, &provider_result).await?;
    Ok(HttpResponse::Ok().json(VerifyResponse::from_outcome(outcome)))
}

//----------------------------------------------   Webhook  -----------------------------------------------------
route!(webhook => Post "/payments/webhook/{provider}" impl ReconciliationDatabase);
/// Receives a provider's webhook delivery.
///
/// The signature is checked against the raw request bytes before anything is parsed; a mismatch is a 403. Once the
/// delivery is authenticated, the response is always a 200, even when reconciliation itself fails, so the provider
/// does not retry a delivery that will never succeed. Failures are reported in the body and the logs instead.
pub async fn webhook<B: ReconciliationDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
    providers: web::Data<ProviderRegistry>,
) -> Result<HttpResponse, ServerError> {
    let provider_id =
        ProviderId::from_str(&path.into_inner()).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    trace!("💻️ Received {provider_id} webhook delivery ({} bytes)", body.len());
    let provider = providers.get(Some(provider_id))?;
    let signature = req
        .headers()
        .get(signature_header(provider_id))
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::InvalidSignature)?;
    let event = provider.parse_webhook(&body, signature)?;
    let Some(payment) = event.payment else {
        debug!("💻️ Acknowledging '{}' event from {provider_id} without action.", event.event_type);
        return Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Event '{}' noted.", event.event_type))));
    };
    let lookup_key = webhook_lookup_key(&payment);
    let provider_result = provider_result_from_event(provider_id, &payment);
    match api.reconcile(&lookup_key, &provider_result).await {
        Ok(outcome) if outcome.reconciled => {
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {} reconciled.", outcome.order.order_id))))
        },
        Ok(outcome) => Ok(HttpResponse::Ok().json(JsonResponse::success(format!(
            "No action taken for order {}. Payment status is '{}'.",
            outcome.order.order_id, outcome.payment_status
        )))),
        Err(e) => {
            warn!("💻️ Could not reconcile {provider_id} webhook [{}]. {e}", payment.provider_tx_id);
            Ok(HttpResponse::Ok().json(JsonResponse::failure(e)))
        },
    }
}

//----------------------------------------------   Order lookup  ------------------------------------------------
route!(payment_success => Get "/payments/success" impl ReconciliationDatabase);
/// Fetches an order and its line items by order id, payment reference, or composite reference. Backs the thank-you
/// page after a redirect flow; nothing here mutates payment state.
pub async fn payment_success<B: ReconciliationDatabase>(
    query: web::Query<SuccessQuery>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let lookup_key = query.into_inner().reference;
    debug!("💻️ GET order for key {lookup_key}");
    let order = api.order_for_key(&lookup_key).await?;
    let items = api.db().fetch_line_items(&order).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": order, "items": items })))
}
