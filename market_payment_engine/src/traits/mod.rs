//! # Backend and provider contracts.
//!
//! This module defines the interfaces the payment engine depends on, and that concrete backends and provider adapters
//! implement.
//!
//! * [`PaymentStore`] is the storage contract. Its implementations (SQLite, in-memory) own the atomic conditional
//!   writes that keep payment and order status consistent.
//! * [`PaymentGateway`] is the provider contract. Live adapters for the mobile money and hosted checkout providers,
//!   as well as the simulated provider, implement it.
mod data_objects;
mod payment_gateway;
mod payment_store;

pub use data_objects::{GatewayRequest, GatewaySession, PayerDetails, TransitionResult, WebhookNotice};
pub use payment_gateway::{GatewayError, PaymentGateway};
pub use payment_store::{PaymentStore, PaymentStoreError};
