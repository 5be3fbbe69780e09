//! Soko REST backend client.
//!
//! # Architecture
//!
//! - Plain JSON over HTTP with `reqwest`; the backend owns the contract
//! - The backend is the source of truth - no local sync, direct API calls
//! - The category list is cached in memory via `moka`; products, carts and
//!   orders are always fetched fresh
//! - Authenticated calls carry `Authorization: Token <token>` per request;
//!   the shared client never holds a user's token
//!
//! # Example
//!
//! ```rust,ignore
//! use soko_storefront::api::{SokoClient, ProductQuery};
//!
//! let client = SokoClient::new(&config.api)?;
//!
//! let products = client.list_products(&ProductQuery::default()).await?;
//! let token = client.login("jane", "hunter22").await?.token;
//! let cart = client.get_cart(&token).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::SokoClient;
pub use types::*;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the Soko backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout, or body read failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("backend returned {status}: {}", .detail.as_deref().unwrap_or("(no detail)"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// First human-readable message found in the error body.
        detail: Option<String>,
    },

    /// Missing or rejected credentials (401/403).
    #[error("unauthorized: {}", .0.as_deref().unwrap_or("(no detail)"))]
    Unauthorized(Option<String>),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint path could not be joined to the base URL.
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the failure is on the network or backend side rather than a
    /// rejection of this particular request.
    #[must_use]
    pub fn is_upstream_failure(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) | Self::Url(_) | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized(_) | Self::NotFound(_) => false,
        }
    }

    /// The backend's own message, if it sent one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } | Self::Unauthorized(detail) => detail.as_deref(),
            _ => None,
        }
    }

    /// Build an error from a non-success response body.
    pub(crate) fn from_status(status: StatusCode, body: &str, path: &str) -> Self {
        let detail = extract_detail(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(detail),
            StatusCode::NOT_FOUND => Self::NotFound(path.to_string()),
            _ => Self::Status {
                status: status.as_u16(),
                detail,
            },
        }
    }
}

/// Pull the first readable message out of a DRF-style error body.
///
/// Handles `{"detail": "..."}`, `{"field": ["..."]}`, `{"non_field_errors": [...]}`
/// and bare `["..."]` lists. Returns `None` for non-JSON bodies (e.g. HTML 500 pages).
#[must_use]
pub fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    first_message(&value)
}

fn first_message(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_message),
        Value::Object(map) => map
            .get("detail")
            .and_then(first_message)
            .or_else(|| map.get("non_field_errors").and_then(first_message))
            .or_else(|| map.values().find_map(first_message)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_shapes() {
        assert_eq!(
            extract_detail(r#"{"detail": "Your cart is empty. Nothing to checkout."}"#).as_deref(),
            Some("Your cart is empty. Nothing to checkout.")
        );
        assert_eq!(
            extract_detail(r#"{"email": ["This email is already in use."]}"#).as_deref(),
            Some("This email is already in use.")
        );
        assert_eq!(
            extract_detail(r#"{"non_field_errors": ["Passwords do not match."], "x": ["y"]}"#)
                .as_deref(),
            Some("Passwords do not match.")
        );
        assert_eq!(
            extract_detail(r#"["Insufficient stock for product: 'Mug'."]"#).as_deref(),
            Some("Insufficient stock for product: 'Mug'.")
        );
    }

    #[test]
    fn test_extract_detail_non_json() {
        assert_eq!(extract_detail("<html>Server Error</html>"), None);
        assert_eq!(extract_detail(""), None);
        assert_eq!(extract_detail(r#"{"count": 3}"#), None);
    }

    #[test]
    fn test_from_status_mapping() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"detail":"Invalid token."}"#, "/x");
        assert!(matches!(err, ApiError::Unauthorized(Some(ref d)) if d == "Invalid token."));
        assert!(!err.is_upstream_failure());

        let err = ApiError::from_status(StatusCode::NOT_FOUND, "", "products/9/");
        assert!(matches!(err, ApiError::NotFound(ref p) if p == "products/9/"));

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":"nope"}"#, "/x");
        assert_eq!(err.detail(), Some("nope"));
        assert!(!err.is_upstream_failure());

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "", "/x");
        assert!(err.is_upstream_failure());
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Status {
            status: 400,
            detail: None,
        };
        assert_eq!(err.to_string(), "backend returned 400: (no detail)");
        assert_eq!(
            ApiError::RateLimited(60).to_string(),
            "Rate limited, retry after 60 seconds"
        );
    }
}
