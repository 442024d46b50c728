//! Market Payment Engine
//!
//! The payment engine takes marketplace orders through payment. It starts payment attempts with external providers
//! (mobile money push payments and hosted card checkouts), and reconciles every outcome the providers report so that
//! each payment, and the order it pays for, reaches exactly one final state.
//!
//! The library is divided into these sections:
//! 1. Storage ([`traits::PaymentStore`]). SQLite is the production backend; an in-memory backend is provided for
//!    tests. Backends own the atomic conditional writes that keep payments and orders consistent.
//!    The data types stored are defined in [`mod@db_types`] and are public.
//! 2. Providers ([`traits::PaymentGateway`]). Adapters translate between a provider's API and
//!    [`db_types::PaymentOutcome`]. The [`mod@gateways`] module contains the gateway registry and a simulated provider.
//! 3. The public API ([`mod@mpe_api`]): order intake, payment initiation, reconciliation and cancellation.
//!
//! The engine emits events when a payment succeeds or fails. Only the caller that moved the payment publishes the
//! event, so subscribers see each outcome once. See [`mod@events`].
pub mod db_types;
pub mod events;
pub mod gateways;
pub mod helpers;
mod memory_db;
pub mod mpe_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod state_machine;
#[cfg(feature = "sqlite")]
pub mod test_utils;
pub mod traits;

pub use gateways::GatewayRegistry;
pub use memory_db::MemoryDatabase;
pub use mpe_api::{
    errors::PaymentFlowError,
    order_api::OrderApi,
    payment_flow_api::{PaymentFlowApi, DEFAULT_GATEWAY_TIMEOUT},
    payment_objects,
    reconciliation_guard::ReconciliationGuard,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use traits::{PaymentGateway, PaymentStore, PaymentStoreError};
