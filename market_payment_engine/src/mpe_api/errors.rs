use thiserror::Error;

use crate::{
    db_types::{GatewayProvider, OrderId, OrderStatusType},
    helpers::ValidationError,
    traits::{GatewayError, PaymentStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Invalid request. {0}")]
    Validation(#[from] ValidationError),
    #[error("Order {0} already has a payment in progress")]
    PaymentInProgress(OrderId),
    /// Also returned when the order exists, but belongs to someone else.
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Order {order_id} cannot be paid for while it is {status}")]
    InvalidOrder { order_id: OrderId, status: OrderStatusType },
    #[error("Order {0} already exists with different details")]
    OrderConflict(OrderId),
    #[error("{0}")]
    NotAllowed(String),
    #[error("No payment gateway is configured for {0}")]
    UnsupportedProvider(GatewayProvider),
    #[error("The payment provider could not complete the request. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Database error: {0}")]
    Database(String),
}

impl PaymentFlowError {
    /// Errors the caller can simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentFlowError::Gateway(_) | PaymentFlowError::Database(_))
    }
}

impl From<PaymentStoreError> for PaymentFlowError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::DatabaseError(s) => PaymentFlowError::Database(s),
            PaymentStoreError::OrderNotFound(id) => PaymentFlowError::OrderNotFound(id),
            PaymentStoreError::PaymentNotFound(id) => PaymentFlowError::PaymentNotFound(id.to_string()),
            PaymentStoreError::OrderConflict(id) => PaymentFlowError::OrderConflict(id),
            PaymentStoreError::PaymentInProgress(id) => PaymentFlowError::PaymentInProgress(id),
            PaymentStoreError::OrderNotPayable { order_id, status } => {
                PaymentFlowError::InvalidOrder { order_id, status }
            },
            e @ PaymentStoreError::InconsistentOrderState { .. } => PaymentFlowError::Database(e.to_string()),
        }
    }
}
