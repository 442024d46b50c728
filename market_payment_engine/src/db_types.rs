use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mpg_common::{MinorUnits, CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle of an order, as far as payment is concerned.
///
/// ```text
///   Pending ──► PaymentPending ──► Confirmed
///      ▲              │
///      └──────────────┼─────────► Failed
///       (cancelled)   │
/// ```
/// `Cancelled` is reserved for order cancellation, which is owned by the order service and never set here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order exists, and no payment attempt is live.
    Pending,
    /// A payment attempt has been handed to a provider and has not settled yet.
    PaymentPending,
    /// The order has been paid in full.
    Confirmed,
    /// The last payment attempt failed.
    Failed,
    /// The order was cancelled.
    Cancelled,
}

impl OrderStatusType {
    /// Orders in these states cannot take a new payment attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Cancelled)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::PaymentPending => write!(f, "PaymentPending"),
            OrderStatusType::Confirmed => write!(f, "Confirmed"),
            OrderStatusType::Failed => write!(f, "Failed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "PaymentPending" => Ok(Self::PaymentPending),
            "Confirmed" => Ok(Self::Confirmed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    /// The customer that placed the order. Only this customer may pay for, or inspect payments on, the order.
    pub customer_id: String,
    pub total_price: MinorUnits,
    pub currency: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The order id as assigned by the order service
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_price: MinorUnits,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    CURRENCY_CODE.to_string()
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, total_price: MinorUnits) -> Self {
        Self { order_id, customer_id, total_price, currency: default_currency() }
    }

    pub fn is_equivalent(&self, order: &Order) -> bool {
        self.order_id == order.order_id
            && self.customer_id == order.customer_id
            && self.total_price == order.total_price
            && self.currency == order.currency
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The attempt has been reserved locally but the provider has not accepted it yet.
    Pending,
    /// The provider accepted the attempt and the customer has not completed it yet.
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal statuses are absorbing. Nothing moves a payment out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// A live payment blocks any other attempt on the same order.
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Processing => write!(f, "Processing"),
            PaymentStatus::Success => write!(f, "Success"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    Card,
    BankTransfer,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::MobileMoney => write!(f, "mobile_money"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
        }
    }
}

//--------------------------------------    GatewayProvider    ---------------------------------------------------------
/// The external payment providers the marketplace integrates with.
///
/// * `MobileMoney` is a push-and-poll provider: the payer approves a prompt on their handset and the gateway is polled.
/// * `HostedCheckout` redirects the payer to a hosted page and reports the outcome through a signed webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayProvider {
    MobileMoney,
    HostedCheckout,
}

impl GatewayProvider {
    pub fn default_method(&self) -> PaymentMethod {
        match self {
            GatewayProvider::MobileMoney => PaymentMethod::MobileMoney,
            GatewayProvider::HostedCheckout => PaymentMethod::Card,
        }
    }

    pub fn supports(&self, method: PaymentMethod) -> bool {
        match self {
            GatewayProvider::MobileMoney => method == PaymentMethod::MobileMoney,
            GatewayProvider::HostedCheckout => true,
        }
    }
}

impl Display for GatewayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayProvider::MobileMoney => write!(f, "mobile_money"),
            GatewayProvider::HostedCheckout => write!(f, "hosted_checkout"),
        }
    }
}

impl FromStr for GatewayProvider {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_money" => Ok(Self::MobileMoney),
            "hosted_checkout" => Ok(Self::HostedCheckout),
            s => Err(ConversionError(format!("Unknown payment provider: {s}"))),
        }
    }
}

//--------------------------------------     OutcomeSource     ---------------------------------------------------------
/// Where an observed payment outcome came from. All sources funnel through the same reconciliation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    /// A client asked us to verify the payment and we queried the provider.
    Poll,
    /// A signed webhook from the provider.
    Webhook,
    /// A redirect or status callback hint. Never trusted on its own, always re-queried.
    Callback,
    /// The reconciliation worker sweeping stale payments.
    Background,
}

impl Display for OutcomeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeSource::Poll => write!(f, "poll"),
            OutcomeSource::Webhook => write!(f, "webhook"),
            OutcomeSource::Callback => write!(f, "callback"),
            OutcomeSource::Background => write!(f, "background"),
        }
    }
}

//--------------------------------------    PaymentOutcome     ---------------------------------------------------------
/// The outcome of a payment as reported by a provider, in a provider-neutral vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The provider has not settled the payment yet.
    Pending,
    Success,
    Failed(String),
}

impl PaymentOutcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentOutcome::Pending)
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Pending => write!(f, "pending"),
            PaymentOutcome::Success => write!(f, "success"),
            PaymentOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
/// A single attempt to pay for an order through one provider.
///
/// The amount is a snapshot of the order total, taken when the attempt was reserved.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: MinorUnits,
    pub method: PaymentMethod,
    pub gateway_provider: GatewayProvider,
    /// The provider-assigned reference. Absent until the provider has accepted the attempt.
    pub gateway_reference: Option<String>,
    pub status: PaymentStatus,
    /// The phone number or email address the provider charges.
    pub payer: String,
    pub failure_reason: Option<String>,
    /// Which source delivered the outcome that settled this payment.
    pub settled_by: Option<OutcomeSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

//--------------------------------------       NewPayment      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub gateway_provider: GatewayProvider,
    pub payer: String,
}

impl NewPayment {
    pub fn new(order_id: OrderId, gateway_provider: GatewayProvider, payer: String) -> Self {
        Self { order_id, method: gateway_provider.default_method(), gateway_provider, payer }
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }
}
