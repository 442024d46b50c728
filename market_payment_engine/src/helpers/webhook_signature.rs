//! # Webhook signatures
//!
//! The hosted checkout provider signs every webhook it sends. The signature is the HMAC-SHA512 of the raw request body,
//! keyed with the merchant's secret key, and sent hex-encoded in a request header.
//!
//! The signature must be checked against the *raw* bytes, before the body is parsed or anything is looked up. The
//! comparison runs in constant time.
use hmac::{Hmac, Mac};
use log::*;
use mpg_common::Secret;
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// The header the hosted checkout provider puts its signature in.
pub const CHECKOUT_SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookSignatureError {
    #[error("No webhook secret is configured")]
    NoSecret,
    #[error("The webhook signature is missing")]
    MissingSignature,
    #[error("The webhook signature is not valid hex")]
    MalformedSignature,
    #[error("The webhook signature does not match the payload")]
    Mismatch,
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Secret<String>,
}

impl WebhookVerifier {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Result<HmacSha512, WebhookSignatureError> {
        if self.secret.is_empty() {
            return Err(WebhookSignatureError::NoSecret);
        }
        HmacSha512::new_from_slice(self.secret.reveal().as_bytes()).map_err(|_| WebhookSignatureError::NoSecret)
    }

    /// Calculates the hex-encoded signature for `payload`.
    pub fn sign(&self, payload: &[u8]) -> Result<String, WebhookSignatureError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<(), WebhookSignatureError> {
        let signature =
            signature.map(str::trim).filter(|s| !s.is_empty()).ok_or(WebhookSignatureError::MissingSignature)?;
        let expected = hex::decode(signature).map_err(|_| WebhookSignatureError::MalformedSignature)?;
        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(&expected).map_err(|_| {
            warn!("🔐️ Webhook signature mismatch");
            WebhookSignatureError::Mismatch
        })?;
        trace!("🔐️ Webhook signature ✅️");
        Ok(())
    }
}
