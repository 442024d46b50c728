#![allow(dead_code)]
use std::{
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use market_payment_engine::{
    db_types::{GatewayProvider, NewOrder, Order, OrderId, PaymentOutcome},
    events::EventProducers,
    gateways::{ProviderLedger, SimulatedProvider, SimulationSettings},
    payment_objects::{InitiatePaymentRequest, PaymentSession},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{GatewayError, GatewayRequest, GatewaySession, PayerDetails, PaymentGateway, WebhookNotice},
    GatewayRegistry,
    OrderApi,
    PaymentFlowApi,
    PaymentStore,
    SqliteDatabase,
};
use mpg_common::{MinorUnits, Secret};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const WEBHOOK_SECRET: &str = "whsec_test_only";

/// Switches that make a [`TestGateway`] misbehave on demand.
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_initialize: AtomicBool,
    pub initialize_delay_ms: AtomicU64,
    pub status_delay_ms: AtomicU64,
}

/// A simulated provider (manual settlement) with fault injection.
#[derive(Clone)]
pub struct TestGateway {
    pub sim: SimulatedProvider,
    pub faults: Arc<Faults>,
}

impl TestGateway {
    pub fn new(provider: GatewayProvider) -> Self {
        let sim = SimulatedProvider::new(provider, ProviderLedger::new(), SimulationSettings::manual())
            .with_webhook_secret(Secret::new(WEBHOOK_SECRET.to_string()));
        Self { sim, faults: Arc::new(Faults::default()) }
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.faults.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn delay_initialize(&self, ms: u64) {
        self.faults.initialize_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn delay_status(&self, ms: u64) {
        self.faults.status_delay_ms.store(ms, Ordering::SeqCst);
    }

    async fn pause(&self, counter: &AtomicU64) {
        let ms = counter.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

impl PaymentGateway for TestGateway {
    fn provider(&self) -> GatewayProvider {
        self.sim.provider()
    }

    async fn initialize(&self, request: &GatewayRequest) -> Result<GatewaySession, GatewayError> {
        self.pause(&self.faults.initialize_delay_ms).await;
        if self.faults.fail_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection reset by peer".into()));
        }
        self.sim.initialize(request).await
    }

    async fn check_status(&self, reference: &str) -> Result<PaymentOutcome, GatewayError> {
        self.pause(&self.faults.status_delay_ms).await;
        self.sim.check_status(reference).await
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        self.sim.cancel(reference).await
    }

    fn webhook_secret(&self) -> Option<&Secret<String>> {
        self.sim.webhook_secret()
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
        self.sim.parse_webhook(payload)
    }
}

#[derive(Default, Clone)]
pub struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

pub struct TestSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: PaymentFlowApi<SqliteDatabase, TestGateway>,
    pub orders: OrderApi<SqliteDatabase>,
    pub mobile: TestGateway,
    pub checkout: TestGateway,
}

impl TestSystem {
    pub async fn new(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let mobile = TestGateway::new(GatewayProvider::MobileMoney);
        let checkout = TestGateway::new(GatewayProvider::HostedCheckout);
        let gateways = GatewayRegistry::new().with_gateway(mobile.clone()).with_gateway(checkout.clone());
        let api = PaymentFlowApi::new(db.clone(), gateways, producers).with_gateway_timeout(Duration::from_millis(250));
        let orders = OrderApi::new(db.clone());
        Self { db_path: url, db, api, orders, mobile, checkout }
    }

    pub async fn order(&self, order_id: &str, customer: &str, total: i64) -> Order {
        let order = NewOrder::new(OrderId::from(order_id), customer.to_string(), MinorUnits::from(total));
        self.orders.create_order(order).await.expect("Error creating order").0
    }

    pub async fn pay_by_phone(&self, order_id: &str, customer: &str) -> PaymentSession {
        let request = InitiatePaymentRequest::new(
            OrderId::from(order_id),
            customer,
            GatewayProvider::MobileMoney,
            PayerDetails::Phone("0241234567".into()),
        );
        self.api.initiate_payment(request).await.expect("Error initiating payment")
    }

    pub async fn pay_by_card(&self, order_id: &str, customer: &str) -> PaymentSession {
        let request = InitiatePaymentRequest::new(
            OrderId::from(order_id),
            customer,
            GatewayProvider::HostedCheckout,
            PayerDetails::Email("buyer@example.com".into()),
        );
        self.api.initiate_payment(request).await.expect("Error initiating payment")
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop(self.api);
        drop(self.orders);
        if let Err(e) = Sqlite::drop_database(&self.db_path).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.db_path);
        }
    }
}
