use std::fmt::Display;

use market_payment_engine::{
    db_types::{GatewayProvider, NewOrder, OrderId, OrderStatusType, PaymentMethod, PaymentStatus},
    helpers::ValidationError,
    payment_objects::{PaymentSession, ReconcileResult},
    traits::PayerDetails,
};
use mpg_common::{MinorUnits, CURRENCY_CODE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// An order handed over by the order service. The total already includes shipping and discounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub order_id: String,
    pub customer_id: String,
    /// In minor units
    pub total: MinorUnits,
    #[serde(default)]
    pub currency: Option<String>,
}

impl From<NewOrderRequest> for NewOrder {
    fn from(req: NewOrderRequest) -> Self {
        let mut order = NewOrder::new(OrderId::from(req.order_id), req.customer_id, req.total);
        order.currency = req.currency.unwrap_or_else(|| CURRENCY_CODE.to_string());
        order
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializePaymentParams {
    pub order_id: String,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    /// The mobile money number to charge
    #[serde(default)]
    pub payer_handle: Option<String>,
    /// The e-mail address the hosted checkout sends its receipt to
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl InitializePaymentParams {
    /// Picks the payer details the provider needs.
    pub fn payer_for(&self, provider: GatewayProvider) -> Result<PayerDetails, ValidationError> {
        match provider {
            GatewayProvider::MobileMoney => {
                self.payer_handle.clone().map(PayerDetails::Phone).ok_or(ValidationError::MissingPayer("payer_handle"))
            },
            GatewayProvider::HostedCheckout => {
                self.email.clone().map(PayerDetails::Email).ok_or(ValidationError::MissingPayer("email"))
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSessionResponse {
    pub payment_id: i64,
    pub order_id: OrderId,
    pub reference: String,
    pub status: PaymentStatus,
    pub order_status: OrderStatusType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl From<PaymentSession> for PaymentSessionResponse {
    fn from(session: PaymentSession) -> Self {
        Self {
            payment_id: session.payment.id,
            reference: session.reference().to_string(),
            order_id: session.order.order_id,
            status: session.payment.status,
            order_status: session.order.status,
            redirect_url: session.redirect_url,
            instructions: session.instructions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub payment_id: i64,
    pub order_id: OrderId,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub order_status: OrderStatusType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<ReconcileResult> for PaymentStatusResponse {
    fn from(result: ReconcileResult) -> Self {
        let ReconcileResult { payment, order, .. } = result;
        Self {
            payment_id: payment.id,
            order_id: order.order_id,
            reference: payment.gateway_reference,
            status: payment.status,
            order_status: order.status,
            failure_reason: payment.failure_reason,
        }
    }
}

/// The body of a push provider callback. Only the reference is used; the outcome is always re-read from the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackHint {
    #[serde(default, alias = "referenceId", alias = "reference_id")]
    pub reference: Option<String>,
}
