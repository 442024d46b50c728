use market_payment_engine::{
    db_types::{GatewayProvider, PaymentOutcome},
    traits::{GatewayError, GatewayRequest, GatewaySession, PaymentGateway},
};
use mockall::mock;

// Webhook handling keeps the trait defaults; the webhook tests use the simulated provider instead.
mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        fn provider(&self) -> GatewayProvider;
        async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError>;
        async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError>;
        async fn cancel(&self, reference: &str) -> Result<(), GatewayError>;
    }
}
