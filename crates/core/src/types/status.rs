//! Order status as reported by the backend.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a placed order.
///
/// The backend sends the capitalized labels (`"Pending"`, `"Shipped"`, ...).
/// Unknown labels deserialize to [`OrderStatus::Other`] so a new backend
/// status never breaks the order history page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Other(s) => s,
        }
    }

    /// Whether the order can no longer change.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses() {
        let s: OrderStatus = serde_json::from_str("\"Shipped\"").unwrap();
        assert_eq!(s, OrderStatus::Shipped);
        assert!(!s.is_final());
        assert!(OrderStatus::Delivered.is_final());
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let s: OrderStatus = serde_json::from_str("\"Returned\"").unwrap();
        assert_eq!(s, OrderStatus::Other("Returned".to_string()));
        assert_eq!(s.to_string(), "Returned");
    }
}
