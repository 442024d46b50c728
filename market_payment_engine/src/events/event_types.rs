use chrono::{DateTime, Utc};
use mpg_common::MinorUnits;
use serde::{Deserialize, Serialize};

use crate::db_types::{GatewayProvider, OrderId, OutcomeSource, Payment, PaymentOutcome};

/// Emitted exactly once per payment, by whoever wins the transition to `Success`. Wallet crediting hangs off this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub order_id: OrderId,
    pub payment_id: i64,
    pub amount: MinorUnits,
    pub settled_at: DateTime<Utc>,
    pub source: OutcomeSource,
}

impl PaymentSucceededEvent {
    pub fn new(payment: &Payment, source: OutcomeSource) -> Self {
        Self {
            order_id: payment.order_id.clone(),
            payment_id: payment.id,
            amount: payment.amount,
            settled_at: payment.confirmed_at.unwrap_or(payment.updated_at),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order_id: OrderId,
    pub payment_id: i64,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
    pub source: OutcomeSource,
}

impl PaymentFailedEvent {
    pub fn new(payment: &Payment, source: OutcomeSource) -> Self {
        Self {
            order_id: payment.order_id.clone(),
            payment_id: payment.id,
            reason: payment.failure_reason.clone().unwrap_or_default(),
            failed_at: payment.failed_at.unwrap_or(payment.updated_at),
            source,
        }
    }
}

/// A provider-side settlement, pushed by a provider that settles asynchronously (e.g. the simulator's delayed
/// settlement task). It is only a signal: consumers feed it through reconciliation like any other outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementNotice {
    pub provider: GatewayProvider,
    pub reference: String,
    pub outcome: PaymentOutcome,
}
