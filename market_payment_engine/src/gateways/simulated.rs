//! # Simulated payment provider
//!
//! A stand-in for either real provider, for development and testing. It keeps its own view of each payment in a
//! [`ProviderLedger`], the way a real provider keeps its own records, and settles every accepted attempt after a random
//! delay on a dedicated task.
//!
//! The settlement task belongs to its ledger entry. Cancelling the attempt aborts the task, but the task may already
//! have fired, in which case the ledger entry is settled and `cancel` reports [`GatewayError::AlreadySettled`].
//! When a settlement fires, a [`SettlementNotice`] is published so it can be fed through reconciliation. The task never
//! touches the payment store.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::*;
use mpg_common::{MinorUnits, Secret};
use rand::Rng;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::{
    db_types::{GatewayProvider, PaymentOutcome},
    events::{EventProducer, SettlementNotice},
    traits::{GatewayError, GatewayRequest, GatewaySession, PaymentGateway, WebhookNotice},
};

pub const SIMULATED_DECLINE_REASON: &str = "The payer declined the payment request";

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Probability, in `[0, 1]`, that an attempt settles successfully
    pub success_rate: f64,
    /// If false, attempts stay pending until [`SimulatedProvider::settle_now`] is called.
    pub auto_settle: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(8),
            success_rate: 0.8,
            auto_settle: true,
        }
    }
}

impl SimulationSettings {
    pub fn manual() -> Self {
        Self { auto_settle: false, ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerStatus {
    Pending,
    Settled(PaymentOutcome),
    Cancelled,
}

#[derive(Debug)]
struct LedgerEntry {
    amount: MinorUnits,
    status: LedgerStatus,
    settlement: Option<JoinHandle<()>>,
}

/// The provider's own record of every attempt it has accepted.
#[derive(Debug, Clone, Default)]
pub struct ProviderLedger {
    entries: Arc<Mutex<HashMap<String, LedgerEntry>>>,
}

impl ProviderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, LedgerEntry>> {
        // No code path panics while holding the lock, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(&self, reference: &str, amount: MinorUnits) {
        let entry = LedgerEntry { amount, status: LedgerStatus::Pending, settlement: None };
        self.entries().insert(reference.to_string(), entry);
    }

    fn attach_settlement(&self, reference: &str, task: JoinHandle<()>) {
        match self.entries().get_mut(reference) {
            Some(entry) if entry.status == LedgerStatus::Pending => entry.settlement = Some(task),
            _ => task.abort(),
        }
    }

    fn abort_settlement(&self, reference: &str) {
        if let Some(task) = self.entries().get_mut(reference).and_then(|e| e.settlement.take()) {
            task.abort();
        }
    }

    pub fn status(&self, reference: &str) -> Option<LedgerStatus> {
        self.entries().get(reference).map(|e| e.status.clone())
    }

    pub fn amount(&self, reference: &str) -> Option<MinorUnits> {
        self.entries().get(reference).map(|e| e.amount)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Settles a pending entry. Returns `true` if this call settled it.
    pub fn settle(&self, reference: &str, outcome: PaymentOutcome) -> bool {
        let mut entries = self.entries();
        match entries.get_mut(reference) {
            Some(entry) if entry.status == LedgerStatus::Pending && outcome.is_settled() => {
                entry.status = LedgerStatus::Settled(outcome);
                entry.settlement = None;
                true
            },
            _ => false,
        }
    }

    fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        let mut entries = self.entries();
        let entry = entries.get_mut(reference).ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))?;
        match entry.status {
            LedgerStatus::Pending => {
                if let Some(task) = entry.settlement.take() {
                    task.abort();
                }
                entry.status = LedgerStatus::Cancelled;
                Ok(())
            },
            LedgerStatus::Cancelled => Ok(()),
            LedgerStatus::Settled(_) => Err(GatewayError::AlreadySettled(reference.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct SimulatedProvider {
    provider: GatewayProvider,
    ledger: ProviderLedger,
    settings: SimulationSettings,
    notifier: Option<EventProducer<SettlementNotice>>,
    webhook_secret: Option<Secret<String>>,
}

impl SimulatedProvider {
    pub fn new(provider: GatewayProvider, ledger: ProviderLedger, settings: SimulationSettings) -> Self {
        Self { provider, ledger, settings, notifier: None, webhook_secret: None }
    }

    /// Settlements are published to `notifier` as they happen.
    pub fn with_notifier(mut self, notifier: EventProducer<SettlementNotice>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_webhook_secret(mut self, secret: Secret<String>) -> Self {
        self.webhook_secret = Some(secret);
        self
    }

    pub fn ledger(&self) -> &ProviderLedger {
        &self.ledger
    }

    /// Settles the attempt immediately, as if the payer had just acted. The pending settlement task is discarded.
    /// Returns `true` if the attempt was still pending.
    pub async fn settle_now(&self, reference: &str, outcome: PaymentOutcome) -> bool {
        self.ledger.abort_settlement(reference);
        let settled = self.ledger.settle(reference, outcome.clone());
        if settled {
            info!("🎭️ Simulated {} payment {reference} settled: {outcome}", self.provider);
            publish(&self.notifier, self.provider, reference, outcome).await;
        }
        settled
    }

    fn roll_outcome(&self) -> (Duration, PaymentOutcome) {
        let mut rng = rand::thread_rng();
        let (min, max) = (self.settings.min_delay, self.settings.max_delay.max(self.settings.min_delay));
        let delay = if max > min { rng.gen_range(min..=max) } else { min };
        let outcome = if rng.gen_bool(self.settings.success_rate.clamp(0.0, 1.0)) {
            PaymentOutcome::Success
        } else {
            PaymentOutcome::Failed(SIMULATED_DECLINE_REASON.to_string())
        };
        (delay, outcome)
    }

    fn spawn_settlement(&self, reference: &str) {
        let (delay, outcome) = self.roll_outcome();
        let ledger = self.ledger.clone();
        let notifier = self.notifier.clone();
        let provider = self.provider;
        let task_reference = reference.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if ledger.settle(&task_reference, outcome.clone()) {
                info!("🎭️ Simulated {provider} payment {task_reference} settled after {delay:?}: {outcome}");
                publish(&notifier, provider, &task_reference, outcome).await;
            }
        });
        self.ledger.attach_settlement(reference, task);
        debug!("🎭️ Settlement for {reference} scheduled in {delay:?}");
    }
}

async fn publish(
    notifier: &Option<EventProducer<SettlementNotice>>,
    provider: GatewayProvider,
    reference: &str,
    outcome: PaymentOutcome,
) {
    if let Some(notifier) = notifier {
        let notice = SettlementNotice { provider, reference: reference.to_string(), outcome };
        notifier.publish_event(notice).await;
    }
}

#[derive(Deserialize)]
struct SimulatedWebhook {
    event: String,
    data: SimulatedWebhookData,
}

#[derive(Deserialize)]
struct SimulatedWebhookData {
    reference: String,
    #[serde(default)]
    gateway_response: Option<String>,
}

impl PaymentGateway for SimulatedProvider {
    fn provider(&self) -> GatewayProvider {
        self.provider
    }

    async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError> {
        if !request.amount.is_positive() {
            return Err(GatewayError::Rejected(format!("Invalid amount {}", request.amount)));
        }
        let reference = format!("SIM-{:016X}", rand::random::<u64>());
        self.ledger.open(&reference, request.amount);
        if self.settings.auto_settle {
            self.spawn_settlement(&reference);
        }
        let session = GatewaySession::new(reference.clone());
        let session = match self.provider {
            GatewayProvider::MobileMoney => session.with_instructions(format!(
                "Approve the payment of {} on the handset for {}",
                request.amount, request.payer
            )),
            GatewayProvider::HostedCheckout => {
                session.with_redirect_url(format!("https://checkout.simulated.invalid/pay/{reference}"))
            },
        };
        info!(
            "🎭️ Simulated {} accepted {} for order {} as {reference}",
            self.provider, request.amount, request.order_id
        );
        Ok(session)
    }

    async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError> {
        match self.ledger.status(reference) {
            None => Err(GatewayError::UnknownReference(reference.to_string())),
            Some(LedgerStatus::Pending) => Ok(PaymentOutcome::Pending),
            Some(LedgerStatus::Settled(outcome)) => Ok(outcome),
            Some(LedgerStatus::Cancelled) => Ok(PaymentOutcome::Failed("Cancelled by the merchant".to_string())),
        }
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        self.ledger.cancel(reference)?;
        debug!("🎭️ Simulated payment {reference} cancelled");
        Ok(())
    }

    fn webhook_secret(&self) -> Option<&Secret<String>> {
        self.webhook_secret.as_ref()
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
        if self.provider != GatewayProvider::HostedCheckout {
            return Err(GatewayError::Unsupported(format!("{} does not send webhooks", self.provider)));
        }
        let webhook: SimulatedWebhook =
            serde_json::from_slice(payload).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let outcome = match webhook.event.as_str() {
            "charge.success" => PaymentOutcome::Success,
            "charge.failed" => PaymentOutcome::Failed(
                webhook.data.gateway_response.unwrap_or_else(|| SIMULATED_DECLINE_REASON.to_string()),
            ),
            _ => return Ok(None),
        };
        Ok(Some(WebhookNotice { reference: webhook.data.reference, outcome }))
    }
}
