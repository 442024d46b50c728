use std::fmt::Debug;

use cucumber::World;
use log::*;
use market_payment_engine::{
    db_types::{GatewayProvider, OrderId, Payment},
    events::EventProducers,
    gateways::{ProviderLedger, SimulatedProvider, SimulationSettings},
    payment_objects::ReconcileResult,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    GatewayRegistry,
    OrderApi,
    PaymentFlowApi,
    PaymentFlowError,
    PaymentStore,
    SqliteDatabase,
};
use mpg_common::Secret;
use tokio::time::sleep;

pub const WEBHOOK_SECRET: &str = "whsec_cucumber";

#[derive(Default, Debug, World)]
pub struct PaymentWorld {
    pub system: Option<PaymentSystem>,
    pub last_result: Option<Result<ReconcileResult, PaymentFlowError>>,
    pub last_error: Option<PaymentFlowError>,
}

pub struct PaymentSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: PaymentFlowApi<SqliteDatabase, SimulatedProvider>,
    pub orders: OrderApi<SqliteDatabase>,
    pub mobile: SimulatedProvider,
    pub checkout: SimulatedProvider,
}

impl Debug for PaymentSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentSystem ({})", self.db_path)
    }
}

impl PaymentWorld {
    pub fn system(&self) -> &PaymentSystem {
        self.system.as_ref().expect("Payment system not initialised")
    }

    pub fn api(&self) -> &PaymentFlowApi<SqliteDatabase, SimulatedProvider> {
        &self.system().api
    }

    pub fn provider(&self, provider: GatewayProvider) -> &SimulatedProvider {
        match provider {
            GatewayProvider::MobileMoney => &self.system().mobile,
            GatewayProvider::HostedCheckout => &self.system().checkout,
        }
    }

    pub async fn latest_payment(&self, order_id: &str) -> Payment {
        self.system()
            .db
            .fetch_payments_for_order(&OrderId::from(order_id))
            .await
            .expect("Error fetching payments")
            .pop()
            .expect("Order has no payments")
    }

    pub fn record(&mut self, result: Result<ReconcileResult, PaymentFlowError>) {
        if let Err(e) = &result {
            debug!("🥒️ Step produced an error: {e}");
        }
        self.last_result = Some(result);
    }
}

impl PaymentSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        sleep(std::time::Duration::from_millis(50)).await;
        let secret = Secret::new(WEBHOOK_SECRET.to_string());
        let mobile =
            SimulatedProvider::new(GatewayProvider::MobileMoney, ProviderLedger::new(), SimulationSettings::manual());
        let checkout =
            SimulatedProvider::new(GatewayProvider::HostedCheckout, ProviderLedger::new(), SimulationSettings::manual())
                .with_webhook_secret(secret);
        let gateways = GatewayRegistry::new().with_gateway(mobile.clone()).with_gateway(checkout.clone());
        let api = PaymentFlowApi::new(db.clone(), gateways, EventProducers::default());
        let orders = OrderApi::new(db.clone());
        Self { db_path: url, db, api, orders, mobile, checkout }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
