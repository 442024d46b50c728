//! Requester identity.
//!
//! Customers are authenticated by the front end that sits in front of this server. It forwards the customer id in a
//! header (`X-Requester-Id` unless configured otherwise with `MPG_REQUESTER_HEADER`), and handlers take a
//! [`Requester`] argument to read it. Requests without the header are refused with `401 Unauthorized`.
use std::{
    fmt::Display,
    future::{ready, Ready},
};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use log::debug;

use crate::{
    config::{ServerOptions, DEFAULT_REQUESTER_HEADER},
    errors::ServerError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester(String);

impl Requester {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromRequest for Requester {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header = req
            .app_data::<web::Data<ServerOptions>>()
            .map(|o| o.requester_header.clone())
            .unwrap_or_else(|| DEFAULT_REQUESTER_HEADER.to_string());
        let requester = req
            .headers()
            .get(header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Requester(s.to_string()));
        let result = requester.ok_or_else(|| {
            debug!("💻️ Request to {} has no {header} header", req.path());
            ServerError::MissingRequester(header)
        });
        ready(result)
    }
}
