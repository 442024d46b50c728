use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use market_payment_engine::{
    db_types::{GatewayProvider, NewOrder, Order, PaymentOutcome},
    events::EventProducers,
    gateways::{ProviderLedger, SimulatedProvider, SimulationSettings},
    GatewayRegistry,
    MemoryDatabase,
    OrderApi,
    PaymentFlowApi,
    PaymentGateway,
};
use mpg_common::{MinorUnits, Secret};

use crate::{
    config::{ServerOptions, DEFAULT_REQUESTER_HEADER},
    routes::{
        CancelPaymentRoute,
        CreateOrderRoute,
        InitializePaymentRoute,
        OrderPaymentsRoute,
        PaymentByIdRoute,
        PaymentCallbackRoute,
        PaymentWebhookRoute,
        VerifyPaymentRoute,
    },
};

pub const CUSTOMER: &str = "alice";
pub const OTHER_CUSTOMER: &str = "bob";
// Test-only secret. DO NOT re-use it anywhere.
pub const WEBHOOK_SECRET: &str = "sk_test_9f1c2e7a55d04b6c";

/// Shared state for one test. Every request builds a fresh app around the same store and API, just like the worker
/// threads of the real server do.
pub struct TestContext<G> {
    pub db: MemoryDatabase,
    pub api: web::Data<PaymentFlowApi<MemoryDatabase, G>>,
    pub options: ServerOptions,
}

impl<G: PaymentGateway + 'static> TestContext<G> {
    pub fn new(gateways: GatewayRegistry<G>) -> Self {
        let db = MemoryDatabase::new();
        let api = PaymentFlowApi::new(db.clone(), gateways, EventProducers::default());
        Self { db, api: web::Data::new(api), options: ServerOptions::default() }
    }

    pub fn with_options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn seed_order(&self, order_id: &str, customer_id: &str, total: i64) -> Order {
        let order = NewOrder::new(order_id.into(), customer_id.to_string(), MinorUnits::from(total));
        let (order, _) = OrderApi::new(self.db.clone()).create_order(order).await.expect("Failed to seed order");
        order
    }

    fn configure(&self, cfg: &mut ServiceConfig) {
        cfg.app_data(web::Data::new(OrderApi::new(self.db.clone())))
            .app_data(self.api.clone())
            .app_data(web::Data::new(self.options.clone()))
            .service(CreateOrderRoute::<MemoryDatabase>::new())
            .service(OrderPaymentsRoute::<MemoryDatabase, G>::new())
            .service(InitializePaymentRoute::<MemoryDatabase, G>::new())
            .service(VerifyPaymentRoute::<MemoryDatabase, G>::new())
            .service(PaymentWebhookRoute::<MemoryDatabase, G>::new())
            .service(PaymentCallbackRoute::<MemoryDatabase, G>::new())
            .service(CancelPaymentRoute::<MemoryDatabase, G>::new())
            .service(PaymentByIdRoute::<MemoryDatabase, G>::new());
    }

    /// Sends the request and returns the status and body. Errors raised by middleware are rendered the way the server
    /// would render them.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new().configure(|cfg| self.configure(cfg));
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => (e.error_response().status(), e.to_string()),
        }
    }
}

impl TestContext<SimulatedProvider> {
    pub fn simulated() -> Self {
        Self::new(simulated_gateways())
    }

    pub fn simulator(&self, provider: GatewayProvider) -> &SimulatedProvider {
        self.api.gateways().get(provider).expect("Simulator is not registered")
    }

    pub async fn settle(&self, provider: GatewayProvider, reference: &str, outcome: PaymentOutcome) {
        assert!(self.simulator(provider).settle_now(reference, outcome).await, "Payment was not pending");
    }
}

/// Simulators that only settle when told to.
pub fn simulated_gateways() -> GatewayRegistry<SimulatedProvider> {
    let settings = SimulationSettings::manual();
    let momo = SimulatedProvider::new(GatewayProvider::MobileMoney, ProviderLedger::new(), settings.clone());
    let checkout = SimulatedProvider::new(GatewayProvider::HostedCheckout, ProviderLedger::new(), settings)
        .with_webhook_secret(Secret::new(WEBHOOK_SECRET.to_string()));
    GatewayRegistry::new().with_gateway(momo).with_gateway(checkout)
}

pub fn as_customer(req: TestRequest, customer: &str) -> TestRequest {
    req.insert_header((DEFAULT_REQUESTER_HEADER, customer))
}
