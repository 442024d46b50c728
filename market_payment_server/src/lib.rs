//! # Market payment gateway server
//! This crate hosts the HTTP surface of the marketplace payment gateway. It is responsible for:
//! * Recording the orders handed over by the order service.
//! * Starting payments with the mobile money and hosted checkout providers, on behalf of the customer that owns the
//!   order.
//! * Receiving provider webhooks and callbacks, and feeding them through reconciliation.
//! * Sweeping payments whose outcome never arrived, in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /orders`: Order intake.
//! * `GET /orders/{order_id}/payments`: Every payment attempt made for an order.
//! * `POST /payments/{provider}/initialize`: Start a payment.
//! * `GET /payments/{provider}/verify/{reference}`: Poll a payment.
//! * `POST /payments/{provider}/webhook`: Signed provider webhooks.
//! * `POST /payments/{provider}/callback`: Provider callbacks.
//! * `GET /payments/{id}`: Fetch a payment.
//! * `POST /payments/{id}/cancel`: Cancel a live payment.
//!
//! Customer-facing routes need the customer id in the requester header. See [auth](auth/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
