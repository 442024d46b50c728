use std::sync::Arc;

use log::*;
use mpg_common::MinorUnits;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::json;

use crate::{
    config::HostedCheckoutConfig,
    data_objects::{ApiEnvelope, CheckoutSession, CheckoutTransaction},
    helpers::send_json,
    GatewayApiError,
};

#[derive(Clone)]
pub struct HostedCheckoutApi {
    config: HostedCheckoutConfig,
    client: Arc<Client>,
}

impl HostedCheckoutApi {
    pub fn new(config: HostedCheckoutConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub fn config(&self) -> &HostedCheckoutConfig {
        &self.config
    }

    /// Opens a checkout session. The buyer must be sent to the returned `authorization_url`.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: MinorUnits,
        reference: &str,
        callback_url: Option<&str>,
    ) -> Result<CheckoutSession, GatewayApiError> {
        let callback_url = callback_url.unwrap_or(self.config.callback_url.as_str());
        let body = json!({
            "email": email,
            "amount": amount.value().to_string(),
            "currency": self.config.currency,
            "reference": reference,
            "callback_url": callback_url,
        });
        debug!("🧾️ Initialising checkout {reference} for {amount}");
        let req = self.client.post(self.url("/transaction/initialize")).json(&body);
        let envelope = send_json::<ApiEnvelope<CheckoutSession>>(req).await?;
        let session = unwrap_envelope(envelope)?;
        info!("🧾️ Checkout {} initialised", session.reference);
        Ok(session)
    }

    /// Looks up the transaction behind `reference`. Safe to call repeatedly.
    pub async fn verify_transaction(&self, reference: &str) -> Result<CheckoutTransaction, GatewayApiError> {
        let path = format!("/transaction/verify/{reference}");
        let req = self.client.get(self.url(&path));
        let envelope = send_json::<ApiEnvelope<CheckoutTransaction>>(req).await?;
        let tx = unwrap_envelope(envelope)?;
        trace!("🧾️ Checkout {reference} has status {}", tx.status);
        Ok(tx)
    }
}

fn unwrap_envelope<T>(envelope: ApiEnvelope<T>) -> Result<T, GatewayApiError> {
    match envelope {
        ApiEnvelope { status: true, data: Some(data), .. } => Ok(data),
        ApiEnvelope { message, .. } => Err(GatewayApiError::Rejected(message)),
    }
}
