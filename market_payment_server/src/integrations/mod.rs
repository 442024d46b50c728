//! Payment gateway integrations.
//!
//! The live adapters wrap the HTTP clients from `gateway_tools` and translate between the provider vocabularies and
//! the engine's [`PaymentOutcome`]. [`ConfiguredGateway`] lets the server hold live and simulated gateways in the same
//! registry, so the choice between them is made once, at start-up. The wallet hooks that act on settled payments live
//! here too.
mod hosted_checkout;
mod mobile_money;
mod wallet;

use gateway_tools::GatewayApiError;
pub use hosted_checkout::HostedCheckoutGateway;
use market_payment_engine::{
    db_types::{GatewayProvider, PaymentOutcome},
    gateways::SimulatedProvider,
    traits::{GatewayError, GatewayRequest, GatewaySession, PaymentGateway, WebhookNotice},
};
pub use mobile_money::MobileMoneyGateway;
use mpg_common::Secret;
pub use wallet::create_wallet_event_handlers;

#[derive(Clone)]
pub enum ConfiguredGateway {
    MobileMoney(MobileMoneyGateway),
    HostedCheckout(HostedCheckoutGateway),
    Simulated(SimulatedProvider),
}

impl PaymentGateway for ConfiguredGateway {
    fn provider(&self) -> GatewayProvider {
        match self {
            Self::MobileMoney(g) => g.provider(),
            Self::HostedCheckout(g) => g.provider(),
            Self::Simulated(g) => g.provider(),
        }
    }

    async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError> {
        match self {
            Self::MobileMoney(g) => g.initialize(request).await,
            Self::HostedCheckout(g) => g.initialize(request).await,
            Self::Simulated(g) => g.initialize(request).await,
        }
    }

    async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError> {
        match self {
            Self::MobileMoney(g) => g.check_status(reference).await,
            Self::HostedCheckout(g) => g.check_status(reference).await,
            Self::Simulated(g) => g.check_status(reference).await,
        }
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        match self {
            Self::MobileMoney(g) => g.cancel(reference).await,
            Self::HostedCheckout(g) => g.cancel(reference).await,
            Self::Simulated(g) => g.cancel(reference).await,
        }
    }

    fn webhook_secret(&self) -> Option<&Secret<String>> {
        match self {
            Self::MobileMoney(g) => g.webhook_secret(),
            Self::HostedCheckout(g) => g.webhook_secret(),
            Self::Simulated(g) => g.webhook_secret(),
        }
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
        match self {
            Self::MobileMoney(g) => g.parse_webhook(payload),
            Self::HostedCheckout(g) => g.parse_webhook(payload),
            Self::Simulated(g) => g.parse_webhook(payload),
        }
    }
}

/// Maps a client error onto the engine's gateway vocabulary. `reference` names the payment the call was about, if any.
pub(crate) fn to_gateway_error(e: GatewayApiError, reference: Option<&str>) -> GatewayError {
    match e {
        GatewayApiError::Timeout(_) => GatewayError::Timeout,
        GatewayApiError::QueryError { status: 404, message } => match reference {
            Some(r) => GatewayError::UnknownReference(r.to_string()),
            None => GatewayError::Rejected(message),
        },
        GatewayApiError::QueryError { status, message } if status >= 500 => {
            GatewayError::Unavailable(format!("Error {status}. {message}"))
        },
        GatewayApiError::QueryError { status, message } => GatewayError::Rejected(format!("Error {status}. {message}")),
        GatewayApiError::Rejected(s)
        | GatewayApiError::InvalidMsisdn(s)
        | GatewayApiError::InvalidCurrencyAmount(s) => GatewayError::Rejected(s),
        GatewayApiError::JsonError(s) => GatewayError::InvalidPayload(s),
        e @ (GatewayApiError::Initialization(_)
        | GatewayApiError::RestResponseError(_)
        | GatewayApiError::AuthorizationError(_)) => GatewayError::Unavailable(e.to_string()),
    }
}
