use log::trace;
use mpg_common::{MinorUnits, MINOR_UNITS_PER_MAJOR};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::GatewayApiError;

const COUNTRY_CODE: &str = "233";

/// Converts a local 10-digit number (`0244000000`) into the international form the mobile-money API expects
/// (`233244000000`). Numbers already in international form are returned without the leading `+`.
pub fn msisdn_from_local(number: &str) -> Result<String, GatewayApiError> {
    let number = number.trim().trim_start_matches('+');
    if !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayApiError::InvalidMsisdn(number.to_string()));
    }
    match (number.strip_prefix('0'), number.starts_with(COUNTRY_CODE)) {
        (Some(rest), _) if rest.len() == 9 => Ok(format!("{COUNTRY_CODE}{rest}")),
        (None, true) if number.len() == 12 => Ok(number.to_string()),
        _ => Err(GatewayApiError::InvalidMsisdn(number.to_string())),
    }
}

/// Providers that quote amounts as decimal strings ("1500.00") are parsed into minor units without floating point.
pub fn parse_major_amount(amount: &str) -> Result<MinorUnits, GatewayApiError> {
    let invalid = |e: String| GatewayApiError::InvalidCurrencyAmount(format!("Invalid amount: {amount}. {e}"));
    let mut parts = amount.trim().split('.');
    let whole = parts.next().unwrap_or_default().parse::<i64>().map_err(|e| invalid(e.to_string()))?;
    let fraction = match parts.next() {
        None => 0,
        Some(f) if f.len() == 1 => f.parse::<i64>().map_err(|e| invalid(e.to_string()))? * 10,
        Some(f) if f.len() == 2 => f.parse::<i64>().map_err(|e| invalid(e.to_string()))?,
        Some(f) => return Err(invalid(format!("{f} has too many decimal places"))),
    };
    if parts.next().is_some() {
        return Err(invalid("too many decimal points".into()));
    }
    Ok(MinorUnits::from(whole * MINOR_UNITS_PER_MAJOR + fraction))
}

/// Sends the request and deserializes a successful JSON response. Non-2xx responses become
/// [`GatewayApiError::QueryError`] carrying the response text.
pub(crate) async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, GatewayApiError> {
    let response = req.send().await?;
    let status = response.status();
    if status.is_success() {
        trace!("REST query successful. {status}");
        response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
    } else {
        let message = response.text().await?;
        Err(GatewayApiError::QueryError { status: status.as_u16(), message })
    }
}

/// Like [`send_json`], but for endpoints that acknowledge with an empty body (e.g. `202 Accepted`).
pub(crate) async fn send_expect_empty(req: RequestBuilder) -> Result<(), GatewayApiError> {
    let response = req.send().await?;
    let status = response.status();
    if status.is_success() {
        trace!("REST command accepted. {status}");
        Ok(())
    } else {
        let message = response.text().await?;
        Err(GatewayApiError::QueryError { status: status.as_u16(), message })
    }
}
