use gateway_tools::{CheckoutTransaction, CheckoutWebhookEvent, HostedCheckoutApi, HostedCheckoutConfig};
use log::*;
use market_payment_engine::{
    db_types::{GatewayProvider, PaymentOutcome},
    traits::{GatewayError, GatewayRequest, GatewaySession, PayerDetails, PaymentGateway, WebhookNotice},
};
use mpg_common::Secret;

use crate::integrations::to_gateway_error;

/// The hosted checkout provider. The payer is redirected to the provider's page; the outcome arrives as a signed
/// webhook, or is read back by verifying the transaction.
#[derive(Clone)]
pub struct HostedCheckoutGateway {
    api: HostedCheckoutApi,
    webhook_secret: Secret<String>,
}

impl HostedCheckoutGateway {
    /// The provider signs its webhooks with the account's secret key.
    pub fn new(config: HostedCheckoutConfig) -> Result<Self, GatewayError> {
        let webhook_secret = config.secret_key.clone();
        let api = HostedCheckoutApi::new(config).map_err(|e| to_gateway_error(e, None))?;
        Ok(Self { api, webhook_secret })
    }
}

impl PaymentGateway for HostedCheckoutGateway {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::HostedCheckout
    }

    async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError> {
        let PayerDetails::Email(email) = &request.payer else {
            return Err(GatewayError::Rejected("Checkout payments need an e-mail address".into()));
        };
        let reference = request.merchant_reference();
        let session = self
            .api
            .initialize_transaction(email, request.amount, &reference, request.callback_url.as_deref())
            .await
            .map_err(|e| to_gateway_error(e, None))?;
        Ok(GatewaySession::new(session.reference).with_redirect_url(session.authorization_url))
    }

    async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError> {
        let tx = self.api.verify_transaction(reference).await.map_err(|e| to_gateway_error(e, Some(reference)))?;
        Ok(outcome_from_transaction(&tx))
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        // Checkout sessions cannot be withdrawn. Abandoned sessions simply never complete.
        debug!("🧾️ Checkout {reference} cannot be withdrawn. It will lapse if the payer abandons it.");
        Ok(())
    }

    fn webhook_secret(&self) -> Option<&Secret<String>> {
        (!self.webhook_secret.is_empty()).then_some(&self.webhook_secret)
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
        let event: CheckoutWebhookEvent =
            serde_json::from_slice(payload).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let outcome = match event.event.as_str() {
            "charge.success" => PaymentOutcome::Success,
            "charge.failed" => PaymentOutcome::Failed(failure_reason(&event.data)),
            other => {
                trace!("🧾️ Ignoring checkout webhook event {other}");
                return Ok(None);
            },
        };
        Ok(Some(WebhookNotice { reference: event.data.reference, outcome }))
    }
}

fn outcome_from_transaction(tx: &CheckoutTransaction) -> PaymentOutcome {
    if tx.is_successful() {
        PaymentOutcome::Success
    } else if tx.is_failed() {
        PaymentOutcome::Failed(failure_reason(tx))
    } else {
        PaymentOutcome::Pending
    }
}

fn failure_reason(tx: &CheckoutTransaction) -> String {
    tx.gateway_response.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| format!("Transaction {}", tx.status))
}
