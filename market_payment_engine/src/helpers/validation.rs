//! Input validation for payment requests.
//!
//! Everything here runs before a provider is contacted, so a malformed request never reaches a gateway.
use std::sync::OnceLock;

use mpg_common::{MinorUnits, CURRENCY_CODE};
use regex::Regex;
use thiserror::Error;

use crate::{db_types::GatewayProvider, traits::PayerDetails};

/// Network prefixes of the mobile money operators the push provider can charge.
pub const MOBILE_MONEY_PREFIXES: [&str; 6] = ["024", "025", "053", "054", "055", "059"];
pub const MAX_REFERENCE_LENGTH: usize = 100;
/// Order ids end up inside merchant references (`mpg-{order_id}-{payment_id}`), which must themselves be valid
/// references.
pub const MAX_ORDER_ID_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The payment amount must be positive, but was {0}")]
    InvalidAmount(MinorUnits),
    #[error("{0} is not a valid mobile money number")]
    InvalidPhoneNumber(String),
    #[error("{0} is not a supported mobile money network")]
    UnsupportedNetwork(String),
    #[error("{0} is not a valid e-mail address")]
    InvalidEmail(String),
    #[error("{0:?} is not a valid payment reference")]
    InvalidReference(String),
    #[error("Missing payer details: {0}")]
    MissingPayer(&'static str),
    #[error("Could not read the request. {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Unsupported(String),
}

fn local_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0\d{9}$").expect("static regex"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]{2,}$").expect("static regex"))
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

pub fn validate_amount(amount: MinorUnits) -> Result<MinorUnits, ValidationError> {
    if amount.is_positive() {
        Ok(amount)
    } else {
        Err(ValidationError::InvalidAmount(amount))
    }
}

/// Normalises a mobile money number to its 10-digit local form, e.g. `+233 24 123 4567` becomes `0241234567`.
pub fn normalize_phone_number(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let local = if let Some(rest) = digits.strip_prefix("+233") {
        format!("0{rest}")
    } else if let Some(rest) = digits.strip_prefix("233").filter(|r| r.len() == 9) {
        format!("0{rest}")
    } else {
        digits
    };
    if !local_number_regex().is_match(&local) {
        return Err(ValidationError::InvalidPhoneNumber(raw.to_string()));
    }
    if !MOBILE_MONEY_PREFIXES.iter().any(|p| local.starts_with(p)) {
        return Err(ValidationError::UnsupportedNetwork(raw.to_string()));
    }
    Ok(local)
}

pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email_regex().is_match(email) {
        Ok(email.to_lowercase())
    } else {
        Err(ValidationError::InvalidEmail(raw.to_string()))
    }
}

/// Checks that the payer details suit the provider, and normalises them.
///
/// Mobile money providers charge a phone number; hosted checkout providers need an e-mail address.
pub fn validate_payer(provider: GatewayProvider, payer: PayerDetails) -> Result<PayerDetails, ValidationError> {
    match (provider, payer) {
        (GatewayProvider::MobileMoney, PayerDetails::Phone(phone)) => {
            Ok(PayerDetails::Phone(normalize_phone_number(&phone)?))
        },
        (GatewayProvider::MobileMoney, PayerDetails::Email(_)) => {
            Err(ValidationError::MissingPayer("mobile money payments need the payer's phone number"))
        },
        (GatewayProvider::HostedCheckout, PayerDetails::Email(email)) => {
            Ok(PayerDetails::Email(validate_email(&email)?))
        },
        (GatewayProvider::HostedCheckout, PayerDetails::Phone(_)) => {
            Err(ValidationError::MissingPayer("hosted checkout payments need the payer's e-mail address"))
        },
    }
}

pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency == CURRENCY_CODE {
        Ok(())
    } else {
        Err(ValidationError::Unsupported(format!("Only {CURRENCY_CODE} is accepted, not {currency}")))
    }
}

/// Provider references and order ids are opaque, but they must be short and URL-safe.
pub fn validate_reference(raw: &str) -> Result<&str, ValidationError> {
    if raw.len() <= MAX_REFERENCE_LENGTH && reference_regex().is_match(raw) {
        Ok(raw)
    } else {
        Err(ValidationError::InvalidReference(raw.to_string()))
    }
}

pub fn validate_order_id(raw: &str) -> Result<&str, ValidationError> {
    if raw.len() > MAX_ORDER_ID_LENGTH {
        return Err(ValidationError::InvalidReference(raw.to_string()));
    }
    validate_reference(raw)
}
