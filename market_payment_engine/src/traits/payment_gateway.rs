use mpg_common::Secret;
use thiserror::Error;

use crate::{
    db_types::{GatewayProvider, PaymentOutcome},
    traits::data_objects::{GatewayRequest, GatewaySession, WebhookNotice},
};

/// The capability set the engine needs from an external payment provider.
///
/// Adapters translate between the provider's vocabulary and [`PaymentOutcome`]. They never touch the store.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    fn provider(&self) -> GatewayProvider;

    /// Hands the attempt to the provider. On success the provider has accepted the attempt and assigned it a
    /// reference.
    async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError>;

    /// Asks the provider for the current outcome of the payment with the given reference.
    async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError>;

    /// Asks the provider to abandon the payment. Providers that cannot cancel return `Ok` and let the attempt lapse.
    async fn cancel(&self, reference: &str) -> Result<(), GatewayError>;

    /// The secret used to sign this provider's webhooks, if it sends any.
    fn webhook_secret(&self) -> Option<&Secret<String>> {
        None
    }

    /// Translates an authenticated webhook body into a notice. Returns `None` for events that carry no payment outcome.
    fn parse_webhook(&self, _payload: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
        Err(GatewayError::Unsupported(format!("{} does not send webhooks", self.provider())))
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment provider did not respond in time")]
    Timeout,
    #[error("The payment provider is unavailable. {0}")]
    Unavailable(String),
    #[error("The payment provider rejected the request. {0}")]
    Rejected(String),
    #[error("The payment provider does not recognise reference {0}")]
    UnknownReference(String),
    #[error("Payment {0} has already settled at the provider")]
    AlreadySettled(String),
    #[error("Unsupported provider operation. {0}")]
    Unsupported(String),
    #[error("Could not interpret the provider payload. {0}")]
    InvalidPayload(String),
}

impl GatewayError {
    /// Transient errors are worth retrying. The payment is in an unknown state until the provider answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Unavailable(_))
    }
}
