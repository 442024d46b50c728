//! Provider IP whitelist middleware for Actix Web.
//!
//! Payment providers publish the addresses their webhooks and callbacks come from. Wrapping a route with this
//! middleware rejects calls from anywhere else with `403 Forbidden`, before the request body is read.
//!
//! The whitelist is read from the [`ServerOptions`] in the app data. If no options are registered, or the whitelist is
//! not configured, every request is allowed, and the webhook signature is the only gate.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorForbidden,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{config::ServerOptions, helpers::get_remote_ip};

pub struct ProviderWhitelistFactory;

impl<S, B> Transform<S, ServiceRequest> for ProviderWhitelistFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ProviderWhitelistService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProviderWhitelistService { service: Rc::new(service) }))
    }
}

pub struct ProviderWhitelistService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ProviderWhitelistService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let options = req.app_data::<web::Data<ServerOptions>>().cloned();
            let Some(whitelist) = options.as_ref().and_then(|o| o.webhook_whitelist.as_ref()) else {
                trace!("🔐️ No provider whitelist is configured. Allowing request.");
                return service.call(req).await;
            };
            let use_x_forwarded_for = options.as_ref().map(|o| o.use_x_forwarded_for).unwrap_or_default();
            let use_forwarded = options.as_ref().map(|o| o.use_forwarded).unwrap_or_default();
            match get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded) {
                Some(ip) if whitelist.contains(&ip) => {
                    trace!("🔐️ Provider request from {ip} ✅️");
                    service.call(req).await
                },
                Some(ip) => {
                    warn!("🔐️ Request to {} from {ip}, which is not a whitelisted provider. Denied.", req.path());
                    Err(ErrorForbidden("Forbidden"))
                },
                None => {
                    warn!("🔐️ No remote address found for a provider request. Denying access.");
                    Err(ErrorForbidden("Forbidden"))
                },
            }
        })
    }
}
