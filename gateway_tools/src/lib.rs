//! Clients for the external payment providers used by the marketplace payment gateway.
//!
//! * [`MobileMoneyApi`] talks to the push-poll mobile-money collection API. A request-to-pay is accepted immediately
//!   and the buyer approves it on their handset; the outcome is discovered by polling its status.
//! * [`HostedCheckoutApi`] talks to the hosted-checkout API. A transaction is initialised and the buyer is redirected
//!   to the provider's checkout page. The outcome arrives as a signed webhook, or by verifying the transaction.
//!
//! These clients carry no business rules. They translate between the provider wire formats and plain Rust types.
mod config;
mod data_objects;
mod error;
mod helpers;
mod hosted_checkout;
mod mobile_money;

pub use config::{HostedCheckoutConfig, MobileMoneyConfig};
pub use data_objects::{
    AccessToken,
    ApiEnvelope,
    CheckoutSession,
    CheckoutTransaction,
    CheckoutWebhookEvent,
    Party,
    RequestToPay,
    RequestToPayStatus,
};
pub use error::GatewayApiError;
pub use helpers::{msisdn_from_local, parse_major_amount};
pub use hosted_checkout::HostedCheckoutApi;
pub use mobile_money::MobileMoneyApi;
