//! The payment/order transition table.
//!
//! Every status change a payment can undergo after it has been reserved is one of the [`PaymentTransition`]s below.
//! Each transition names the payment statuses it may start from, and the order transition that must be applied in
//! the same atomic write. Backends apply a transition as a conditional update ("move to X only if currently in one
//! of Y"), so concurrent writers racing on the same payment resolve to exactly one winner.
//!
//! | Transition | Payment from          | Payment to | Order from              | Order to       |
//! |------------|-----------------------|------------|-------------------------|----------------|
//! | Activate   | Pending               | Processing | Pending, PaymentPending | PaymentPending |
//! | Succeed    | Processing            | Success    | PaymentPending          | Confirmed      |
//! | Fail       | Processing            | Failed     | PaymentPending          | Failed         |
//! | Cancel     | Pending, Processing   | Cancelled  | Pending, PaymentPending | Pending        |
use chrono::{DateTime, Utc};

use crate::db_types::{OrderStatusType, OutcomeSource, PaymentOutcome, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransition {
    /// The provider accepted the attempt and assigned it a reference.
    Activate { reference: String, at: DateTime<Utc> },
    Succeed { source: OutcomeSource, at: DateTime<Utc> },
    Fail { reason: String, source: OutcomeSource, at: DateTime<Utc> },
    Cancel { at: DateTime<Utc> },
}

/// The order-side half of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEffect {
    pub from: &'static [OrderStatusType],
    pub to: OrderStatusType,
}

impl PaymentTransition {
    pub fn activate<S: Into<String>>(reference: S) -> Self {
        Self::Activate { reference: reference.into(), at: Utc::now() }
    }

    pub fn cancel() -> Self {
        Self::Cancel { at: Utc::now() }
    }

    /// Maps a settled provider outcome onto its transition. `Pending` outcomes carry no transition.
    pub fn from_outcome(outcome: &PaymentOutcome, source: OutcomeSource) -> Option<Self> {
        let at = Utc::now();
        match outcome {
            PaymentOutcome::Pending => None,
            PaymentOutcome::Success => Some(Self::Succeed { source, at }),
            PaymentOutcome::Failed(reason) => Some(Self::Fail { reason: reason.clone(), source, at }),
        }
    }

    pub fn target(&self) -> PaymentStatus {
        match self {
            Self::Activate { .. } => PaymentStatus::Processing,
            Self::Succeed { .. } => PaymentStatus::Success,
            Self::Fail { .. } => PaymentStatus::Failed,
            Self::Cancel { .. } => PaymentStatus::Cancelled,
        }
    }

    pub fn allowed_from(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Self::Activate { .. } => &[Pending],
            Self::Succeed { .. } | Self::Fail { .. } => &[Processing],
            Self::Cancel { .. } => &[Pending, Processing],
        }
    }

    pub fn order_effect(&self) -> OrderEffect {
        use OrderStatusType::*;
        match self {
            Self::Activate { .. } => OrderEffect { from: &[Pending, PaymentPending], to: PaymentPending },
            Self::Succeed { .. } => OrderEffect { from: &[PaymentPending], to: Confirmed },
            Self::Fail { .. } => OrderEffect { from: &[PaymentPending], to: Failed },
            Self::Cancel { .. } => OrderEffect { from: &[Pending, PaymentPending], to: Pending },
        }
    }

    pub fn is_allowed_from(&self, status: PaymentStatus) -> bool {
        self.allowed_from().contains(&status)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Activate { at, .. } | Self::Succeed { at, .. } | Self::Fail { at, .. } | Self::Cancel { at } => *at,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Activate { reference, .. } => Some(reference.as_str()),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Fail { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<OutcomeSource> {
        match self {
            Self::Succeed { source, .. } | Self::Fail { source, .. } => Some(*source),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Succeed { .. } => "succeed",
            Self::Fail { .. } => "fail",
            Self::Cancel { .. } => "cancel",
        }
    }
}

/// True if some transition in the table moves a payment from `from` to `to`.
pub fn is_valid_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Processing) | (Pending, Cancelled) | (Processing, Success | Failed | Cancelled)
    )
}
