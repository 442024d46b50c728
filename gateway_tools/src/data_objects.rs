use serde::{Deserialize, Serialize};
use serde_json::Value;

//--------------------------------------   Mobile money   -----------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub party_id_type: String,
    pub party_id: String,
}

impl Party {
    pub fn msisdn(number: &str) -> Self {
        Self { party_id_type: "MSISDN".to_string(), party_id: number.to_string() }
    }
}

/// Body of a request-to-pay. The amount is a decimal string in major units.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestToPay {
    pub amount: String,
    pub currency: String,
    pub external_id: String,
    pub payer: Party,
    pub payer_message: String,
    pub payee_note: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestToPayStatus {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub financial_transaction_id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    /// `PENDING`, `SUCCESSFUL` or `FAILED`
    pub status: String,
    /// Only present for failures. The provider sends either a bare code or an object with `code` and `message`.
    #[serde(default)]
    pub reason: Option<Value>,
}

impl RequestToPayStatus {
    pub fn is_successful(&self) -> bool {
        self.status.eq_ignore_ascii_case("SUCCESSFUL")
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("FAILED") || self.status.eq_ignore_ascii_case("REJECTED")
    }

    pub fn failure_reason(&self) -> String {
        match &self.reason {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v["message"].as_str().or_else(|| v["code"].as_str()).unwrap_or("UNKNOWN").to_string(),
            None => "UNKNOWN".to_string(),
        }
    }
}

//--------------------------------------   Hosted checkout   --------------------------------------------------------

/// Every hosted-checkout response is wrapped in this envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutTransaction {
    pub reference: String,
    /// `success`, `failed`, `abandoned`, `ongoing`, `pending`, `processing`, `queued` or `reversed`
    pub status: String,
    /// Minor units
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
}

impl CheckoutTransaction {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "reversed")
    }
}

/// A webhook delivery. Only the fields needed to reconcile a payment are extracted.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutWebhookEvent {
    pub event: String,
    pub data: CheckoutTransaction,
}
