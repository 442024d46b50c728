use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The provider did not respond in time: {0}")]
    Timeout(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The provider rejected the request: {0}")]
    Rejected(String),
    #[error("Could not obtain an access token: {0}")]
    AuthorizationError(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
    #[error("Invalid phone number: {0}")]
    InvalidMsisdn(String),
}

impl GatewayApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for GatewayApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::RestResponseError(e.to_string())
        }
    }
}
