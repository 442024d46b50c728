use std::fmt::Display;

use mpg_common::MinorUnits;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, Payment, PaymentMethod, PaymentOutcome};

/// The result of [`crate::traits::PaymentStore::apply_transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// This caller won the conditional update. Both records reflect the new state.
    Applied { payment: Payment, order: Order },
    /// The payment was not in a state the transition may start from. Nothing was written.
    Unchanged { payment: Payment, order: Order },
}

impl TransitionResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied { .. })
    }

    pub fn payment(&self) -> &Payment {
        match self {
            TransitionResult::Applied { payment, .. } | TransitionResult::Unchanged { payment, .. } => payment,
        }
    }

    pub fn into_parts(self) -> (Payment, Order) {
        match self {
            TransitionResult::Applied { payment, order } | TransitionResult::Unchanged { payment, order } => {
                (payment, order)
            },
        }
    }
}

/// Who the provider charges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayerDetails {
    /// A local mobile money number, e.g. `0241234567`
    Phone(String),
    Email(String),
}

impl PayerDetails {
    pub fn as_str(&self) -> &str {
        match self {
            PayerDetails::Phone(s) | PayerDetails::Email(s) => s.as_str(),
        }
    }
}

impl Display for PayerDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an adapter needs to hand an attempt to its provider.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub payment_id: i64,
    pub order_id: OrderId,
    pub amount: MinorUnits,
    pub method: PaymentMethod,
    pub payer: PayerDetails,
    pub callback_url: Option<String>,
}

impl GatewayRequest {
    /// Our own reference for the attempt, which providers echo back in their records.
    pub fn merchant_reference(&self) -> String {
        format!("mpg-{}-{}", self.order_id.as_str(), self.payment_id)
    }
}

/// What the provider hands back when it accepts an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub reference: String,
    /// Hosted checkout providers send the payer here to complete the payment.
    pub redirect_url: Option<String>,
    /// Push providers describe what the payer must do on their handset.
    pub instructions: Option<String>,
}

impl GatewaySession {
    pub fn new<S: Into<String>>(reference: S) -> Self {
        Self { reference: reference.into(), redirect_url: None, instructions: None }
    }

    pub fn with_redirect_url<S: Into<String>>(mut self, url: S) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// A payment outcome reported by a provider webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotice {
    pub reference: String,
    pub outcome: PaymentOutcome,
}
