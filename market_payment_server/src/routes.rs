//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use market_payment_engine::{
    db_types::OrderId,
    helpers::CHECKOUT_SIGNATURE_HEADER,
    payment_objects::InitiatePaymentRequest,
    traits::{PaymentGateway, PaymentStore},
    OrderApi,
    PaymentFlowApi,
    PaymentFlowError,
};

use crate::{
    auth::Requester,
    data_objects::{
        CallbackHint,
        InitializePaymentParams,
        JsonResponse,
        NewOrderRequest,
        PaymentSessionResponse,
        PaymentStatusResponse,
    },
    errors::ServerError,
    helpers::parse_provider,
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

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where whitelisted) => {
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
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::ProviderWhitelistFactory);
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

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentStore);
/// Route handler for order intake
///
/// The order service calls this once an order's total is final. Resubmitting the same order is harmless: the stored
/// order is returned with `200 OK`. A new order gets `201 Created`. Submitting different details under an existing
/// order id fails with `409 Conflict`.
pub async fn create_order<B: PaymentStore>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order {} for {}", order.order_id, order.customer_id);
    let (order, inserted) = api.create_order(order.into()).await?;
    if inserted {
        Ok(HttpResponse::Created().json(order))
    } else {
        Ok(HttpResponse::Ok().json(order))
    }
}

route!(order_payments => Get "/orders/{order_id}/payments" impl PaymentStore, PaymentGateway);
pub async fn order_payments<B: PaymentStore, G: PaymentGateway>(
    path: web::Path<String>,
    requester: Requester,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET payments for order {order_id} by {requester}");
    let payments = api.payments_for_order(&order_id, requester.as_str()).await?;
    Ok(HttpResponse::Ok().json(payments))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initialize_payment => Post "/payments/{provider}/initialize" impl PaymentStore, PaymentGateway);
/// Route handler for starting a payment
///
/// The body names the order and the payer: a `payer_handle` (mobile money number) for `mobile_money`, or an `email`
/// for `hosted_checkout`. The response carries the provider reference and either a `redirect_url` to send the buyer
/// to, or `instructions` for approving the payment on their handset.
///
/// An order can only have one live payment. A second attempt fails with `409 Conflict` until the first one settles or
/// is cancelled.
pub async fn initialize_payment<B: PaymentStore, G: PaymentGateway>(
    path: web::Path<String>,
    requester: Requester,
    body: web::Json<InitializePaymentParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let provider = parse_provider(&path.into_inner())?;
    let params = body.into_inner();
    debug!("💻️ POST initialize {provider} payment for order {} by {requester}", params.order_id);
    let payer = params.payer_for(provider).map_err(PaymentFlowError::from)?;
    let mut request =
        InitiatePaymentRequest::new(OrderId::from(params.order_id), requester.as_str(), provider, payer);
    if let Some(method) = params.method {
        request = request.with_method(method);
    }
    if let Some(url) = params.callback_url {
        request = request.with_callback_url(url);
    }
    let session = api.initiate_payment(request).await?;
    Ok(HttpResponse::Ok().json(PaymentSessionResponse::from(session)))
}

route!(verify_payment => Get "/payments/{provider}/verify/{reference}" impl PaymentStore, PaymentGateway);
/// Route handler for the client poll
///
/// Returns the stored state of a settled payment straight away. A payment that is still processing is checked with
/// the provider first. If the provider cannot be reached, the call fails with `502 Bad Gateway` and the payment is
/// left as it was; try again later.
pub async fn verify_payment<B: PaymentStore, G: PaymentGateway>(
    path: web::Path<(String, String)>,
    requester: Requester,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let (provider, reference) = path.into_inner();
    let provider = parse_provider(&provider)?;
    debug!("💻️ GET verify {provider} payment [{reference}] for {requester}");
    let result = api.verify_payment(provider, &reference, requester.as_str()).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(result)))
}

route!(payment_webhook => Post "/payments/{provider}/webhook" impl PaymentStore, PaymentGateway where whitelisted);
/// Route handler for provider webhooks
///
/// Webhooks carry no auth token. They are authenticated solely by the signature over the raw body, which is checked
/// before anything else happens. A bad signature gets an empty `401`.
///
/// Providers retry deliveries that are not acknowledged, so anything that cannot be acted upon (unknown references,
/// events without an outcome) is acknowledged with `200 OK` and logged.
pub async fn payment_webhook<B: PaymentStore, G: PaymentGateway>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let provider = parse_provider(&path.into_inner())?;
    trace!("💻️ Received {provider} webhook ({} bytes)", body.len());
    let signature = req.headers().get(CHECKOUT_SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match api.process_signed_webhook(provider, body.as_ref(), signature).await {
        Ok(Some(result)) => {
            debug!("💻️ {provider} webhook processed. Payment #{} is {}", result.payment.id, result.payment.status);
            Ok(HttpResponse::Ok().json(JsonResponse::success("Webhook processed")))
        },
        Ok(None) => Ok(HttpResponse::Ok().json(JsonResponse::success("Event ignored"))),
        Err(PaymentFlowError::PaymentNotFound(reference)) => {
            warn!("💻️ {provider} sent a webhook for {reference}, which is not one of ours. Acknowledging it anyway.");
            Ok(HttpResponse::Ok().json(JsonResponse::failure("Unknown payment reference")))
        },
        Err(e) => Err(e.into()),
    }
}

route!(payment_callback => Post "/payments/{provider}/callback" impl PaymentStore, PaymentGateway where whitelisted);
/// Route handler for push provider callbacks
///
/// Callbacks are unsigned, so their contents are only a hint that something happened to a payment. The reference is
/// taken from the body and the outcome is read back from the provider.
pub async fn payment_callback<B: PaymentStore, G: PaymentGateway>(
    path: web::Path<String>,
    body: web::Json<CallbackHint>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let provider = parse_provider(&path.into_inner())?;
    let Some(reference) = body.into_inner().reference else {
        warn!("💻️ {provider} callback did not carry a payment reference. Ignoring it.");
        return Ok(HttpResponse::Ok().json(JsonResponse::failure("No payment reference")));
    };
    debug!("💻️ {provider} callback for [{reference}]");
    match api.process_callback(provider, &reference).await {
        Ok(result) => Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(result))),
        Err(PaymentFlowError::PaymentNotFound(_)) => {
            warn!("💻️ {provider} sent a callback for [{reference}], which is not one of ours. Ignoring it.");
            Ok(HttpResponse::Ok().json(JsonResponse::failure("Unknown payment reference")))
        },
        Err(e) => Err(e.into()),
    }
}

route!(payment_by_id => Get "/payments/{id}" impl PaymentStore, PaymentGateway);
pub async fn payment_by_id<B: PaymentStore, G: PaymentGateway>(
    path: web::Path<i64>,
    requester: Requester,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    debug!("💻️ GET payment #{payment_id} for {requester}");
    let payment = api.payment_by_id(payment_id, requester.as_str()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(cancel_payment => Post "/payments/{id}/cancel" impl PaymentStore, PaymentGateway);
/// Route handler for cancelling a payment
///
/// Only live payments can be cancelled. The order goes back to `Pending`, so the buyer can pay another way. A payment
/// the provider has already settled cannot be cancelled, and the call fails with `422`.
pub async fn cancel_payment<B: PaymentStore, G: PaymentGateway>(
    path: web::Path<i64>,
    requester: Requester,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    info!("💻️ POST cancel payment #{payment_id} by {requester}");
    let result = api.cancel_payment(payment_id, requester.as_str()).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(result)))
}

