use std::{env, time::Duration};

use log::*;
use mpg_common::{Secret, CURRENCY_CODE};

const DEFAULT_MOMO_BASE_URL: &str = "https://sandbox.momodeveloper.mtn.com";
const DEFAULT_MOMO_TARGET_ENVIRONMENT: &str = "sandbox";
const DEFAULT_CHECKOUT_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Default)]
pub struct MobileMoneyConfig {
    pub base_url: String,
    /// Sent as `Ocp-Apim-Subscription-Key` on every request.
    pub subscription_key: Secret<String>,
    pub api_user: String,
    pub api_key: Secret<String>,
    pub target_environment: String,
    pub callback_url: Option<String>,
    pub currency: String,
    pub request_timeout: Duration,
}

impl MobileMoneyConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env::var("MPG_MOMO_BASE_URL").unwrap_or_else(|_| {
            warn!("📱️ MPG_MOMO_BASE_URL not set, using the sandbox URL {DEFAULT_MOMO_BASE_URL}");
            DEFAULT_MOMO_BASE_URL.to_string()
        });
        let subscription_key = Secret::new(env::var("MPG_MOMO_SUBSCRIPTION_KEY").unwrap_or_else(|_| {
            warn!("📱️ MPG_MOMO_SUBSCRIPTION_KEY not set, using (probably useless) default");
            String::default()
        }));
        let api_user = env::var("MPG_MOMO_API_USER").unwrap_or_else(|_| {
            warn!("📱️ MPG_MOMO_API_USER not set, using (probably useless) default");
            String::default()
        });
        let api_key = Secret::new(env::var("MPG_MOMO_API_KEY").unwrap_or_else(|_| {
            warn!("📱️ MPG_MOMO_API_KEY not set, using (probably useless) default");
            String::default()
        }));
        let target_environment = env::var("MPG_MOMO_TARGET_ENVIRONMENT").unwrap_or_else(|_| {
            info!("📱️ MPG_MOMO_TARGET_ENVIRONMENT not set, using {DEFAULT_MOMO_TARGET_ENVIRONMENT}");
            DEFAULT_MOMO_TARGET_ENVIRONMENT.to_string()
        });
        let callback_url = env::var("MPG_MOMO_CALLBACK_URL").ok();
        let currency = env::var("MPG_MOMO_CURRENCY").unwrap_or_else(|_| CURRENCY_CODE.to_string());
        let request_timeout = request_timeout_from_env();
        Self {
            base_url,
            subscription_key,
            api_user,
            api_key,
            target_environment,
            callback_url,
            currency,
            request_timeout,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostedCheckoutConfig {
    pub base_url: String,
    /// Bearer token for API calls. The same key signs webhook deliveries.
    pub secret_key: Secret<String>,
    /// Where the checkout page sends the buyer once they are done.
    pub callback_url: String,
    pub currency: String,
    pub request_timeout: Duration,
}

impl HostedCheckoutConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env::var("MPG_CHECKOUT_BASE_URL").unwrap_or_else(|_| {
            info!("🧾️ MPG_CHECKOUT_BASE_URL not set, using {DEFAULT_CHECKOUT_BASE_URL}");
            DEFAULT_CHECKOUT_BASE_URL.to_string()
        });
        let secret_key = Secret::new(env::var("MPG_CHECKOUT_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🧾️ MPG_CHECKOUT_SECRET_KEY not set, using (probably useless) default");
            String::default()
        }));
        let callback_url = env::var("MPG_CHECKOUT_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("🧾️ MPG_CHECKOUT_CALLBACK_URL not set. Buyers will not be redirected back to the store.");
            String::default()
        });
        let currency = env::var("MPG_CHECKOUT_CURRENCY").unwrap_or_else(|_| CURRENCY_CODE.to_string());
        let request_timeout = request_timeout_from_env();
        Self { base_url, secret_key, callback_url, currency, request_timeout }
    }
}

fn request_timeout_from_env() -> Duration {
    env::var("MPG_GATEWAY_TIMEOUT_MS")
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("🪛️ {s} is not a valid value for MPG_GATEWAY_TIMEOUT_MS. {e}"))
                .ok()
        })
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
}
