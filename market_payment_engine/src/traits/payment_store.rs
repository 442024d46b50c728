use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment},
    state_machine::PaymentTransition,
    traits::data_objects::TransitionResult,
};

/// This trait defines the behaviour that storage backends must provide for the payment engine.
///
/// Two rules hold for every implementation:
/// * At most one *live* (`Pending` or `Processing`) payment exists per order. A second reservation fails with
///   [`PaymentStoreError::PaymentInProgress`], no matter how many callers race.
/// * A payment status change and its order status change are written in one atomic step (see
///   [`PaymentStore::apply_transition`]). No reader ever sees one without the other.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: Clone {
    /// The URL of the backend
    fn url(&self) -> &str;

    /// Stores a new order. This call is idempotent: submitting an equivalent order again returns the stored order with
    /// `false` in the second field. Submitting a *different* order under an existing order id is an error.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PaymentStoreError>;

    /// The payment together with its order, read as one consistent snapshot. A concurrent transition is either fully
    /// visible in both records or not at all.
    async fn fetch_payment_and_order(&self, payment_id: i64) -> Result<Option<(Payment, Order)>, PaymentStoreError>;

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, PaymentStoreError>;

    /// All payment attempts for the order, oldest first.
    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentStoreError>;

    /// `Processing` payments that have not been touched for at least `min_age`.
    async fn fetch_stale_payments(&self, min_age: Duration) -> Result<Vec<Payment>, PaymentStoreError>;

    /// Reserves a payment attempt for the order in a single atomic step:
    /// * the order must exist and be `Pending` or `PaymentPending`,
    /// * the amount is copied from the order total,
    /// * no other live payment may exist for the order.
    ///
    /// The new payment has status `Pending` and no provider reference.
    async fn reserve_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;

    /// Removes a reservation that never reached the provider. Only `Pending` payments are removed. Returns `true` if a
    /// row was deleted.
    async fn discard_reservation(&self, payment_id: i64) -> Result<bool, PaymentStoreError>;

    /// Applies `transition` to the payment if, and only if, the payment is currently in one of the transition's
    /// `allowed_from` states. The matching order update is applied in the same atomic write.
    ///
    /// Returns [`TransitionResult::Applied`] to exactly one of any number of concurrent callers. Everyone else gets
    /// [`TransitionResult::Unchanged`] with the current state.
    async fn apply_transition(
        &self,
        payment_id: i64,
        transition: &PaymentTransition,
    ) -> Result<TransitionResult, PaymentStoreError>;

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("Order {0} already exists with different details")]
    OrderConflict(OrderId),
    #[error("Order {0} already has a payment in progress")]
    PaymentInProgress(OrderId),
    #[error("Order {order_id} cannot take a payment while it is {status}")]
    OrderNotPayable { order_id: OrderId, status: OrderStatusType },
    #[error("Order {order_id} is {status}, which does not allow the payment to {transition}")]
    InconsistentOrderState { order_id: OrderId, status: OrderStatusType, transition: &'static str },
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
