use crate::domain::error::ReviewError;
use reqwest::StatusCode;

/// 429, 418 (Binance IP ban) and 5xx are transient. Any other non-success
/// status is a validation failure.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> ReviewError {
    let msg = format!("{provider} API {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 || status.is_server_error() {
        ReviewError::Transient(msg)
    } else {
        ReviewError::Validation(msg)
    }
}

pub(crate) fn classify_transport(provider: &str, e: reqwest::Error) -> ReviewError {
    if e.is_decode() {
        ReviewError::Validation(format!("{provider} parse error: {e}"))
    } else {
        ReviewError::Transient(format!("{provider} request error: {e}"))
    }
}
