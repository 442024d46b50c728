//! # Market payment engine public API
//!
//! The `mpe_api` module exposes the programmatic API of the payment engine.
//!
//! * [`order_api`] records the orders that arrive from the order service.
//! * [`payment_flow_api`] is the primary API. It starts payment attempts with a provider, reconciles the outcomes the
//!   providers report (however they arrive), and cancels attempts on request.
//! * [`reconciliation_guard`] is the single place where payment status changes are written.
//!
//! # API usage
//!
//! Every API is created from a backend that implements [`PaymentStore`](crate::traits::PaymentStore). The payment flow
//! API also needs the configured gateways, and the producers of any event hooks.
//!
//! ```rust,ignore
//! use market_payment_engine::{GatewayRegistry, PaymentFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let gateways = GatewayRegistry::new().with_gateway(my_gateway);
//! let api = PaymentFlowApi::new(db, gateways, EventProducers::default());
//! let session = api.initiate_payment(request).await?;
//! ```

pub mod errors;
pub mod order_api;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod reconciliation_guard;
