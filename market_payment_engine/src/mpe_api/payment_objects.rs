use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{GatewayProvider, Order, OrderId, Payment, PaymentMethod},
    traits::PayerDetails,
};

/// How a caller identifies a payment: by our id, or by the reference the provider assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentKey {
    Id(i64),
    Reference(String),
}

impl Display for PaymentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentKey::Id(id) => write!(f, "#{id}"),
            PaymentKey::Reference(r) => write!(f, "[{r}]"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitiatePaymentRequest {
    pub order_id: OrderId,
    /// The customer asking to pay. Must own the order.
    pub requester: String,
    pub provider: GatewayProvider,
    /// Defaults to the provider's usual method
    pub method: Option<PaymentMethod>,
    pub payer: PayerDetails,
    /// Where a hosted checkout should send the payer back to
    pub callback_url: Option<String>,
}

impl InitiatePaymentRequest {
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        requester: S,
        provider: GatewayProvider,
        payer: PayerDetails,
    ) -> Self {
        Self { order_id, requester: requester.into(), provider, method: None, payer, callback_url: None }
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_callback_url<S: Into<String>>(mut self, url: S) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// A payment attempt the provider has accepted, plus whatever the client needs to let the payer complete it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub payment: Payment,
    pub order: Order,
    pub redirect_url: Option<String>,
    pub instructions: Option<String>,
}

impl PaymentSession {
    pub fn reference(&self) -> &str {
        self.payment.gateway_reference.as_deref().unwrap_or_default()
    }
}

/// The state of a payment and its order after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub payment: Payment,
    pub order: Order,
    /// True only for the caller whose outcome moved the payment.
    pub transitioned: bool,
}

impl ReconcileResult {
    pub fn applied(payment: Payment, order: Order) -> Self {
        Self { payment, order, transitioned: true }
    }

    pub fn unchanged(payment: Payment, order: Order) -> Self {
        Self { payment, order, transitioned: false }
    }
}
