//! Order intake. Orders arrive from the marketplace's order service; this API only records them.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId},
    helpers::{validate_currency, validate_order_id, ValidationError},
    mpe_api::errors::PaymentFlowError,
    traits::PaymentStore,
};

pub struct OrderApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi ({:?})", self.db)
    }
}

impl<B> OrderApi<B>
where B: PaymentStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Records a new order in the `Pending` state.
    ///
    /// Submitting the same order twice is harmless: the stored order is returned along with `false`. Submitting an
    /// existing order id with different details is an [`PaymentFlowError::OrderConflict`].
    ///
    /// Zero-value orders are accepted here, but cannot be paid for.
    pub async fn create_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentFlowError> {
        validate_order_id(order.order_id.as_str())?;
        if order.customer_id.trim().is_empty() {
            return Err(ValidationError::InvalidPayload("The order has no customer id".into()).into());
        }
        if order.total_price.value() < 0 {
            return Err(ValidationError::InvalidAmount(order.total_price).into());
        }
        validate_currency(&order.currency)?;
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            info!("🧾️ Order {} for {} ({}) recorded", order.order_id, order.customer_id, order.total_price);
        } else {
            debug!("🧾️ Order {} was already recorded", order.order_id);
        }
        Ok((order, inserted))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentFlowError> {
        let order = self.db.fetch_order_by_order_id(order_id).await?;
        Ok(order)
    }
}
