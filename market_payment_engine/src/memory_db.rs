//! An in-memory [`PaymentStore`].
//!
//! All state lives behind one async mutex, so every trait method is a single atomic step, which gives the same
//! conditional-write guarantees as the SQLite backend. Used by tests, and by anything else that needs a fast,
//! deterministic store without a database file.
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{Duration, Utc};
use log::*;
use tokio::sync::Mutex;

use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, PaymentStatus},
    state_machine::PaymentTransition,
    traits::{PaymentStore, PaymentStoreError, TransitionResult},
};

#[derive(Debug, Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    payments: BTreeMap<i64, Payment>,
    next_order_id: i64,
    next_payment_id: i64,
}

impl MemoryState {
    fn order(&self, order_id: &OrderId) -> Result<&Order, PaymentStoreError> {
        self.orders.get(order_id).ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))
    }

    fn payment(&self, payment_id: i64) -> Result<&Payment, PaymentStoreError> {
        self.payments.get(&payment_id).ok_or(PaymentStoreError::PaymentNotFound(payment_id))
    }

    fn snapshot(&self, payment_id: i64) -> Result<(Payment, Order), PaymentStoreError> {
        let payment = self.payment(payment_id)?.clone();
        let order = self.order(&payment.order_id)?.clone();
        Ok((payment, order))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentStore for MemoryDatabase {
    fn url(&self) -> &str {
        "memory://"
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.orders.get(&order.order_id) {
            return if order.is_equivalent(existing) {
                Ok((existing.clone(), false))
            } else {
                Err(PaymentStoreError::OrderConflict(existing.order_id.clone()))
            };
        }
        state.next_order_id += 1;
        let now = Utc::now();
        let new_order = Order {
            id: state.next_order_id,
            order_id: order.order_id.clone(),
            customer_id: order.customer_id,
            total_price: order.total_price,
            currency: order.currency,
            status: OrderStatusType::Pending,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        };
        state.orders.insert(order.order_id, new_order.clone());
        debug!("🗃️ Order [{}] inserted with id {}", new_order.order_id, new_order.id);
        Ok((new_order, true))
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        Ok(self.state.lock().await.orders.get(order_id).cloned())
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PaymentStoreError> {
        Ok(self.state.lock().await.payments.get(&payment_id).cloned())
    }

    async fn fetch_payment_and_order(&self, payment_id: i64) -> Result<Option<(Payment, Order)>, PaymentStoreError> {
        let state = self.state.lock().await;
        if !state.payments.contains_key(&payment_id) {
            return Ok(None);
        }
        state.snapshot(payment_id).map(Some)
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let state = self.state.lock().await;
        let payment = state.payments.values().find(|p| p.gateway_reference.as_deref() == Some(reference)).cloned();
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentStoreError> {
        let state = self.state.lock().await;
        Ok(state.payments.values().filter(|p| &p.order_id == order_id).cloned().collect())
    }

    async fn fetch_stale_payments(&self, min_age: Duration) -> Result<Vec<Payment>, PaymentStoreError> {
        let cutoff = Utc::now() - min_age;
        let state = self.state.lock().await;
        let mut stale = state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Processing && p.updated_at <= cutoff)
            .cloned()
            .collect::<Vec<_>>();
        stale.sort_by_key(|p| p.updated_at);
        Ok(stale)
    }

    async fn reserve_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError> {
        let mut state = self.state.lock().await;
        let order = state.order(&payment.order_id)?;
        if !matches!(order.status, OrderStatusType::Pending | OrderStatusType::PaymentPending) {
            return Err(PaymentStoreError::OrderNotPayable { order_id: order.order_id.clone(), status: order.status });
        }
        let amount = order.total_price;
        let live = state.payments.values().any(|p| p.order_id == payment.order_id && p.status.is_live());
        if live {
            return Err(PaymentStoreError::PaymentInProgress(payment.order_id));
        }
        state.next_payment_id += 1;
        let now = Utc::now();
        let reserved = Payment {
            id: state.next_payment_id,
            order_id: payment.order_id,
            amount,
            method: payment.method,
            gateway_provider: payment.gateway_provider,
            gateway_reference: None,
            status: PaymentStatus::Pending,
            payer: payment.payer,
            failure_reason: None,
            settled_by: None,
            created_at: now,
            updated_at: now,
            initiated_at: None,
            confirmed_at: None,
            failed_at: None,
            cancelled_at: None,
        };
        state.payments.insert(reserved.id, reserved.clone());
        debug!("🗃️ Payment #{} reserved for order {} ({})", reserved.id, reserved.order_id, reserved.amount);
        Ok(reserved)
    }

    async fn discard_reservation(&self, payment_id: i64) -> Result<bool, PaymentStoreError> {
        let mut state = self.state.lock().await;
        let pending = state.payments.get(&payment_id).map(|p| p.status == PaymentStatus::Pending).unwrap_or(false);
        if pending {
            state.payments.remove(&payment_id);
            debug!("🗃️ Reservation for payment #{payment_id} discarded");
        }
        Ok(pending)
    }

    async fn apply_transition(
        &self,
        payment_id: i64,
        transition: &PaymentTransition,
    ) -> Result<TransitionResult, PaymentStoreError> {
        let mut state = self.state.lock().await;
        let payment = state.payment(payment_id)?;
        if !transition.is_allowed_from(payment.status) {
            let (payment, order) = state.snapshot(payment_id)?;
            return Ok(TransitionResult::Unchanged { payment, order });
        }
        if let Some(reference) = transition.reference() {
            let taken = state
                .payments
                .values()
                .any(|p| p.id != payment_id && p.gateway_reference.as_deref() == Some(reference));
            if taken {
                return Err(PaymentStoreError::DatabaseError(format!("Duplicate gateway reference {reference}")));
            }
        }
        let order_id = payment.order_id.clone();
        let effect = transition.order_effect();
        let order = state.order(&order_id)?;
        if !effect.from.contains(&order.status) {
            error!(
                "🗃️ Payment #{payment_id} could {} but order {order_id} is {}. Nothing changed.",
                transition.name(),
                order.status
            );
            return Err(PaymentStoreError::InconsistentOrderState {
                order_id,
                status: order.status,
                transition: transition.name(),
            });
        }
        let at = transition.timestamp();
        let now = Utc::now();
        if let Some(payment) = state.payments.get_mut(&payment_id) {
            payment.status = transition.target();
            payment.updated_at = now;
            match transition {
                PaymentTransition::Activate { reference, .. } => {
                    payment.gateway_reference = Some(reference.clone());
                    payment.initiated_at = Some(at);
                },
                PaymentTransition::Succeed { source, .. } => {
                    payment.settled_by = Some(*source);
                    payment.confirmed_at = Some(at);
                },
                PaymentTransition::Fail { reason, source, .. } => {
                    payment.settled_by = Some(*source);
                    payment.failure_reason = Some(reason.clone());
                    payment.failed_at = Some(at);
                },
                PaymentTransition::Cancel { .. } => payment.cancelled_at = Some(at),
            }
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = effect.to;
            order.updated_at = now;
            if effect.to == OrderStatusType::Confirmed {
                order.confirmed_at = Some(now);
            }
        }
        let (payment, order) = state.snapshot(payment_id)?;
        Ok(TransitionResult::Applied { payment, order })
    }
}
