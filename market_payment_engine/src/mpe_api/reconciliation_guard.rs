//! The single gate through which a payment's status changes after it has been reserved.
//!
//! The guard translates intents (activate, settle, cancel) into entries of the transition table and hands them to the
//! store's conditional write. Nothing else in the engine calls [`PaymentStore::apply_transition`].
use log::*;

use crate::{
    db_types::{OutcomeSource, PaymentOutcome},
    state_machine::PaymentTransition,
    traits::{PaymentStore, PaymentStoreError, TransitionResult},
};

#[derive(Clone)]
pub struct ReconciliationGuard<B> {
    db: B,
}

impl<B: PaymentStore> ReconciliationGuard<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// `Pending -> Processing` once the provider has accepted the attempt under `reference`.
    pub async fn activate(&self, payment_id: i64, reference: &str) -> Result<TransitionResult, PaymentStoreError> {
        self.apply(payment_id, PaymentTransition::activate(reference)).await
    }

    /// `Processing -> Success | Failed`. A pending outcome carries no transition and returns `None`.
    pub async fn settle(
        &self,
        payment_id: i64,
        outcome: &PaymentOutcome,
        source: OutcomeSource,
    ) -> Result<Option<TransitionResult>, PaymentStoreError> {
        match PaymentTransition::from_outcome(outcome, source) {
            Some(transition) => self.apply(payment_id, transition).await.map(Some),
            None => Ok(None),
        }
    }

    /// `Pending | Processing -> Cancelled`
    pub async fn cancel(&self, payment_id: i64) -> Result<TransitionResult, PaymentStoreError> {
        self.apply(payment_id, PaymentTransition::cancel()).await
    }

    async fn apply(
        &self,
        payment_id: i64,
        transition: PaymentTransition,
    ) -> Result<TransitionResult, PaymentStoreError> {
        trace!("🔄️ Payment #{payment_id}: attempting to {}", transition.name());
        let result = self.db.apply_transition(payment_id, &transition).await?;
        match &result {
            TransitionResult::Applied { payment, .. } => {
                debug!("🔄️ Payment #{payment_id}: {} applied, now {}", transition.name(), payment.status)
            },
            TransitionResult::Unchanged { payment, .. } => {
                debug!("🔄️ Payment #{payment_id}: cannot {} from {}. No change.", transition.name(), payment.status)
            },
        }
        Ok(result)
    }
}
