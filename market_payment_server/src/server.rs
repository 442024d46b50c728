use std::{env, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::{HostedCheckoutConfig, MobileMoneyConfig};
use log::*;
use market_payment_engine::{
    db_types::GatewayProvider,
    events::{EventProducer, SettlementNotice},
    gateways::{ProviderLedger, SimulatedProvider},
    GatewayRegistry,
    OrderApi,
    PaymentFlowApi,
    SqliteDatabase,
};
use mpg_common::Secret;
use tokio::sync::mpsc;

use crate::{
    config::{GatewayMode, ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{create_wallet_event_handlers, ConfiguredGateway, HostedCheckoutGateway, MobileMoneyGateway},
    reconciliation_worker::{start_reconciliation_worker, start_settlement_listener, ServerPaymentApi},
    routes::{
        health,
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

const SETTLEMENT_BUFFER_SIZE: usize = 50;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let (settlement_tx, settlement_rx) = mpsc::channel(SETTLEMENT_BUFFER_SIZE);
    let gateways = configure_gateways(&config, EventProducer::new(settlement_tx))?;
    info!("🚀️ Payment gateways ({}): {:?}", config.gateway_mode, gateways.providers());
    let handlers = create_wallet_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let api = PaymentFlowApi::new(db.clone(), gateways, producers).with_gateway_timeout(config.gateway_timeout);
    let api = Arc::new(api);
    // The listener only receives notices in simulated mode. Live providers report through webhooks and callbacks.
    let _listener = start_settlement_listener(Arc::clone(&api), settlement_rx);
    let _worker = start_reconciliation_worker(Arc::clone(&api), config.reconcile_interval, config.reconcile_after);
    let srv = create_server_instance(config, db, api)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    api: Arc<ServerPaymentApi>,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let payments_api = web::Data::from(api);
    let srv = HttpServer::new(move || {
        let orders_api = OrderApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mpg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(payments_api.clone())
            .app_data(web::Data::new(options.clone()))
            .service(health)
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderPaymentsRoute::<SqliteDatabase, ConfiguredGateway>::new())
            .service(InitializePaymentRoute::<SqliteDatabase, ConfiguredGateway>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, ConfiguredGateway>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, ConfiguredGateway>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase, ConfiguredGateway>::new())
            .service(CancelPaymentRoute::<SqliteDatabase, ConfiguredGateway>::new())
            .service(PaymentByIdRoute::<SqliteDatabase, ConfiguredGateway>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Builds a gateway for every provider. In live mode these talk to the real providers; in simulated mode every
/// provider is played by a [`SimulatedProvider`] that pushes its settlements to `notifier`.
pub fn configure_gateways(
    config: &ServerConfig,
    notifier: EventProducer<SettlementNotice>,
) -> Result<GatewayRegistry<ConfiguredGateway>, ServerError> {
    let registry = match config.gateway_mode {
        GatewayMode::Live => {
            let momo = MobileMoneyGateway::new(MobileMoneyConfig::new_from_env_or_default())
                .map_err(|e| ServerError::ConfigurationError(format!("Mobile money gateway: {e}")))?;
            let checkout = HostedCheckoutGateway::new(HostedCheckoutConfig::new_from_env_or_default())
                .map_err(|e| ServerError::ConfigurationError(format!("Hosted checkout gateway: {e}")))?;
            GatewayRegistry::new()
                .with_gateway(ConfiguredGateway::MobileMoney(momo))
                .with_gateway(ConfiguredGateway::HostedCheckout(checkout))
        },
        GatewayMode::Simulated => {
            let settings = config.simulation.clone();
            let momo = SimulatedProvider::new(GatewayProvider::MobileMoney, ProviderLedger::new(), settings.clone())
                .with_notifier(notifier.clone());
            let mut checkout = SimulatedProvider::new(GatewayProvider::HostedCheckout, ProviderLedger::new(), settings)
                .with_notifier(notifier);
            match env::var("MPG_CHECKOUT_SECRET_KEY") {
                Ok(secret) if !secret.is_empty() => {
                    checkout = checkout.with_webhook_secret(Secret::new(secret));
                },
                _ => warn!("🎭️ MPG_CHECKOUT_SECRET_KEY is not set. Simulated checkout webhooks will be rejected."),
            }
            GatewayRegistry::new()
                .with_gateway(ConfiguredGateway::Simulated(momo))
                .with_gateway(ConfiguredGateway::Simulated(checkout))
        },
    };
    Ok(registry)
}
