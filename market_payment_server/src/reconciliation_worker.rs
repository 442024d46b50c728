use std::{sync::Arc, time::Duration};

use log::*;
use market_payment_engine::{
    events::SettlementNotice,
    payment_objects::ReconcileResult,
    PaymentFlowApi,
    PaymentFlowError,
    SqliteDatabase,
};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::integrations::ConfiguredGateway;

pub type ServerPaymentApi = PaymentFlowApi<SqliteDatabase, ConfiguredGateway>;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, payments that have been processing for longer than `min_age` are checked with their provider.
/// This catches the outcomes of payments whose webhooks or callbacks never arrived.
pub fn start_reconciliation_worker(
    api: Arc<ServerPaymentApi>,
    interval: Duration,
    min_age: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Reconciliation worker started. Sweeping every {interval:?}");
        loop {
            timer.tick().await;
            trace!("🕰️ Running stale payment reconciliation job");
            match api.reconcile_stale_payments(min_age).await {
                Ok(results) if results.is_empty() => {},
                Ok(results) => {
                    let settled = results.iter().filter(|r| r.transitioned).count();
                    info!("🕰️ Checked {} stale payments. {settled} settled.", results.len());
                    debug!("🕰️ Settled payments: {}", payment_list(&results));
                },
                Err(e) => {
                    error!("🕰️ Error running stale payment reconciliation job: {e}");
                },
            }
        }
    })
}

/// Feeds settlements pushed by in-process providers through reconciliation. The listener stops once every sender is
/// dropped.
pub fn start_settlement_listener(
    api: Arc<ServerPaymentApi>,
    mut notices: mpsc::Receiver<SettlementNotice>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("📬️ Settlement listener started");
        while let Some(notice) = notices.recv().await {
            let reference = notice.reference.clone();
            match api.process_settlement_notice(notice).await {
                Ok(result) if result.transitioned => {
                    debug!("📬️ Settlement for [{reference}] applied. Payment is {}", result.payment.status)
                },
                Ok(_) => trace!("📬️ Settlement for [{reference}] was already reconciled"),
                Err(PaymentFlowError::PaymentNotFound(_)) => {
                    warn!("📬️ Received a settlement for [{reference}], but there is no such payment")
                },
                Err(e) => error!("📬️ Could not apply settlement for [{reference}]. {e}"),
            }
        }
        info!("📬️ Settlement listener has shut down");
    })
}

fn payment_list(results: &[ReconcileResult]) -> String {
    results
        .iter()
        .filter(|r| r.transitioned)
        .map(|r| format!("#{} order_id: {} status: {}", r.payment.id, r.payment.order_id, r.payment.status))
        .collect::<Vec<String>>()
        .join(", ")
}
