//! Error types for fleetgrant-inventory

use thiserror::Error;

/// Errors that can occur while querying the inventory service
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// The service could not be reached or the request failed in transit
    #[error("inventory request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success status
    #[error("inventory service error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Body returned by the service
        message: String,
    },

    /// Request timed out
    #[error("inventory request timed out")]
    Timeout,

    /// Failed to parse query results
    #[error("inventory response parse error: {0}")]
    ParseError(String),

    /// Invalid service URL
    #[error("invalid inventory URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for InventoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InventoryError::Timeout
        } else if err.is_decode() {
            InventoryError::ParseError(err.to_string())
        } else {
            InventoryError::RequestFailed(err.to_string())
        }
    }
}

impl From<url::ParseError> for InventoryError {
    fn from(err: url::ParseError) -> Self {
        InventoryError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_conversion() {
        let err: InventoryError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, InventoryError::InvalidUrl(_)));
        assert!(err.to_string().starts_with("invalid inventory URL"));
    }

    #[test]
    fn test_api_error_display() {
        let err = InventoryError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "inventory service error (503): unavailable");
    }
}
