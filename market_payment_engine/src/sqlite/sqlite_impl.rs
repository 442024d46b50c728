//! `SqliteDatabase` is the production implementation of the [`PaymentStore`] backend.
//!
//! Every mutation that touches more than one row runs inside a single SQLite transaction whose first statement is the
//! guarded write. SQLite takes the writer lock on that first write, so the read-back that follows sees exactly the
//! state this transaction produced.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, payments};
use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, Payment},
    state_machine::PaymentTransition,
    traits::{PaymentStore, PaymentStoreError, TransitionResult},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `MPG_DATABASE_URL` environment variable, or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_and_order(&self, payment_id: i64) -> Result<Option<(Payment, Order)>, PaymentStoreError> {
        // Both reads share one read transaction, and so one snapshot of the database
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::fetch_payment(payment_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let order = orders::fetch_order_by_order_id(&payment.order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::OrderNotFound(payment.order_id.clone()))?;
        tx.commit().await?;
        Ok(Some((payment, order)))
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_reference(reference, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_stale_payments(&self, min_age: Duration) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_stale_payments(min_age, &mut conn).await?;
        Ok(payments)
    }

    async fn reserve_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let reserved = payments::insert_reservation(&payment, &mut tx).await?;
        match reserved {
            Some(reserved) => {
                tx.commit().await?;
                debug!(
                    "🗃️ Payment #{} reserved for order {} ({})",
                    reserved.id, reserved.order_id, reserved.amount
                );
                Ok(reserved)
            },
            None => {
                let order = orders::fetch_order_by_order_id(&payment.order_id, &mut tx).await?;
                tx.rollback().await?;
                match order {
                    None => Err(PaymentStoreError::OrderNotFound(payment.order_id)),
                    Some(order) => {
                        Err(PaymentStoreError::OrderNotPayable { order_id: order.order_id, status: order.status })
                    },
                }
            },
        }
    }

    async fn discard_reservation(&self, payment_id: i64) -> Result<bool, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = payments::delete_reservation(payment_id, &mut conn).await?;
        if deleted {
            debug!("🗃️ Reservation for payment #{payment_id} discarded");
        }
        Ok(deleted)
    }

    async fn apply_transition(
        &self,
        payment_id: i64,
        transition: &PaymentTransition,
    ) -> Result<TransitionResult, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(order_id) = payments::apply_payment_transition(payment_id, transition, &mut tx).await? else {
            tx.rollback().await?;
            trace!("🗃️ Payment #{payment_id} is not eligible to {}. Nothing changed.", transition.name());
            let (payment, order) =
                self.fetch_payment_and_order(payment_id).await?.ok_or(PaymentStoreError::PaymentNotFound(payment_id))?;
            return Ok(TransitionResult::Unchanged { payment, order });
        };
        let effect = transition.order_effect();
        let changed = orders::apply_order_effect(&order_id, &effect, &mut tx).await?;
        if changed == 0 {
            let status = orders::fetch_order_by_order_id(&order_id, &mut tx).await?.map(|o| o.status);
            tx.rollback().await?;
            error!(
                "🗃️ Payment #{payment_id} could {} but order {order_id} is {status:?}. The transition was rolled back.",
                transition.name()
            );
            return Err(match status {
                Some(status) => {
                    PaymentStoreError::InconsistentOrderState { order_id, status, transition: transition.name() }
                },
                None => PaymentStoreError::OrderNotFound(order_id),
            });
        }
        let payment = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or(PaymentStoreError::PaymentNotFound(payment_id))?;
        let order = orders::fetch_order_by_order_id(&order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment #{payment_id} is now {} and order {} is now {}",
            payment.status, order.order_id, order.status
        );
        Ok(TransitionResult::Applied { payment, order })
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
