use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use market_payment_engine::PaymentFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The request does not identify the customer making it. Missing {0} header.")]
    MissingRequester(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotAllowed(String),
    #[error("The payment provider could not be reached. Please try again. {0}")]
    GatewayUnavailable(String),
    #[error("Invalid signature")]
    InvalidSignature,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MissingRequester(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotAllowed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Webhook senders learn nothing about why a signature was refused
        if matches!(self, Self::InvalidSignature) {
            return HttpResponse::build(self.status_code()).finish();
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::Validation(e) => Self::InvalidRequestBody(e.to_string()),
            PaymentFlowError::UnsupportedProvider(p) => {
                Self::InvalidRequestPath(format!("No payment gateway is configured for {p}"))
            },
            e @ (PaymentFlowError::OrderNotFound(_) | PaymentFlowError::PaymentNotFound(_)) => {
                Self::NoRecordFound(e.to_string())
            },
            e @ (PaymentFlowError::PaymentInProgress(_) | PaymentFlowError::OrderConflict(_)) => {
                Self::Conflict(e.to_string())
            },
            e @ (PaymentFlowError::NotAllowed(_) | PaymentFlowError::InvalidOrder { .. }) => {
                Self::NotAllowed(e.to_string())
            },
            PaymentFlowError::Gateway(e) => Self::GatewayUnavailable(e.to_string()),
            PaymentFlowError::InvalidSignature => Self::InvalidSignature,
            PaymentFlowError::Database(e) => {
                error!("💻️ Database error while handling a request. {e}");
                Self::BackendError(e)
            },
        }
    }
}
