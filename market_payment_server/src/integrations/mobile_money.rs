use gateway_tools::{MobileMoneyApi, MobileMoneyConfig, RequestToPayStatus};
use log::*;
use market_payment_engine::{
    db_types::{GatewayProvider, PaymentOutcome},
    traits::{GatewayError, GatewayRequest, GatewaySession, PayerDetails, PaymentGateway},
};

use crate::integrations::to_gateway_error;

/// The push-and-poll provider. The payer approves a prompt on their handset, and the outcome is read back by polling.
#[derive(Clone)]
pub struct MobileMoneyGateway {
    api: MobileMoneyApi,
}

impl MobileMoneyGateway {
    pub fn new(config: MobileMoneyConfig) -> Result<Self, GatewayError> {
        let api = MobileMoneyApi::new(config).map_err(|e| to_gateway_error(e, None))?;
        Ok(Self { api })
    }
}

impl PaymentGateway for MobileMoneyGateway {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::MobileMoney
    }

    async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError> {
        let PayerDetails::Phone(phone) = &request.payer else {
            return Err(GatewayError::Rejected("Mobile money payments need a phone number".into()));
        };
        let message = format!("Payment for order {}", request.order_id);
        let reference = self
            .api
            .request_to_pay(request.amount, phone, &request.merchant_reference(), &message)
            .await
            .map_err(|e| to_gateway_error(e, None))?;
        let instructions = format!("Approve the payment of {} on the handset for {phone}", request.amount);
        Ok(GatewaySession::new(reference).with_instructions(instructions))
    }

    async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError> {
        let status = self.api.request_to_pay_status(reference).await.map_err(|e| to_gateway_error(e, Some(reference)))?;
        Ok(outcome_from_status(&status))
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        // There is no way to withdraw a request-to-pay. Unanswered requests expire at the provider.
        debug!("📱️ Request-to-pay {reference} cannot be withdrawn. It will lapse if the payer ignores it.");
        Ok(())
    }
}

fn outcome_from_status(status: &RequestToPayStatus) -> PaymentOutcome {
    if status.is_successful() {
        PaymentOutcome::Success
    } else if status.is_failed() {
        PaymentOutcome::Failed(status.failure_reason())
    } else {
        PaymentOutcome::Pending
    }
}
