use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use mpg_common::MinorUnits;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::MobileMoneyConfig,
    data_objects::{AccessToken, Party, RequestToPay, RequestToPayStatus},
    helpers::{msisdn_from_local, send_expect_empty, send_json},
    GatewayApiError,
};

/// Tokens are refreshed a little before the provider would expire them.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Clone)]
pub struct MobileMoneyApi {
    config: MobileMoneyConfig,
    client: Arc<Client>,
    token: Arc<RwLock<Option<(String, DateTime<Utc>)>>>,
}

impl MobileMoneyApi {
    pub fn new(config: MobileMoneyConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(config.subscription_key.reveal().as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("Ocp-Apim-Subscription-Key", val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(RwLock::new(None)) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Returns a cached bearer token, fetching a new one when the cached token is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, GatewayApiError> {
        if let Some((token, expiry)) = self.token.read().await.as_ref() {
            if *expiry > Utc::now() {
                return Ok(token.clone());
            }
        }
        let mut cache = self.token.write().await;
        trace!("📱️ Requesting a new collection access token");
        let req = self
            .client
            .post(self.url("/collection/token/"))
            .basic_auth(&self.config.api_user, Some(self.config.api_key.reveal()))
            .header("Content-Length", "0");
        let token = send_json::<AccessToken>(req)
            .await
            .map_err(|e| GatewayApiError::AuthorizationError(e.to_string()))?;
        let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        let expiry = Utc::now() + Duration::seconds(lifetime);
        *cache = Some((token.access_token.clone(), expiry));
        debug!("📱️ Collection access token refreshed. Valid until {expiry}");
        Ok(token.access_token)
    }

    /// Submits a request-to-pay. The provider acknowledges with `202 Accepted` and the buyer approves the request on
    /// their handset. Returns the reference id that identifies this request in all later calls.
    pub async fn request_to_pay(
        &self,
        amount: MinorUnits,
        payer_number: &str,
        external_id: &str,
        payer_message: &str,
    ) -> Result<String, GatewayApiError> {
        let msisdn = msisdn_from_local(payer_number)?;
        let reference = Uuid::new_v4().to_string();
        let body = RequestToPay {
            amount: amount.to_major_string(),
            currency: self.config.currency.clone(),
            external_id: external_id.to_string(),
            payer: Party::msisdn(&msisdn),
            payer_message: payer_message.to_string(),
            payee_note: format!("Marketplace payment {external_id}"),
        };
        let token = self.access_token().await?;
        let mut req = self
            .client
            .post(self.url("/collection/v1_0/requesttopay"))
            .bearer_auth(token)
            .header("X-Reference-Id", reference.as_str())
            .header("X-Target-Environment", self.config.target_environment.as_str())
            .json(&body);
        if let Some(callback) = &self.config.callback_url {
            req = req.header("X-Callback-Url", callback.as_str());
        }
        debug!("📱️ Sending request-to-pay {reference} for {amount} (external id {external_id})");
        send_expect_empty(req).await?;
        info!("📱️ Request-to-pay {reference} accepted by the provider");
        Ok(reference)
    }

    /// Fetches the current status of a request-to-pay. Safe to call repeatedly.
    pub async fn request_to_pay_status(&self, reference: &str) -> Result<RequestToPayStatus, GatewayApiError> {
        let token = self.access_token().await?;
        let path = format!("/collection/v1_0/requesttopay/{reference}");
        let req = self
            .client
            .get(self.url(&path))
            .bearer_auth(token)
            .header("X-Target-Environment", self.config.target_environment.as_str());
        let status = send_json::<RequestToPayStatus>(req).await?;
        trace!("📱️ Request-to-pay {reference} has status {}", status.status);
        Ok(status)
    }
}
