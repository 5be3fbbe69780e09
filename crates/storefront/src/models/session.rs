//! Session-related types.
//!
//! Types stored in the server-side session for authentication state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{AuthToken, UserProfile};

/// Session-stored user identity.
///
/// Holds the backend token and the last profile fetched with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    /// Backend auth token.
    pub token: AuthToken,
    /// Profile as last returned by the backend.
    pub profile: UserProfile,
    /// When the token was last confirmed by a profile fetch.
    pub validated_at: DateTime<Utc>,
}

impl SessionUser {
    /// A freshly validated session user.
    #[must_use]
    pub fn new(token: AuthToken, profile: UserProfile) -> Self {
        Self {
            token,
            profile,
            validated_at: Utc::now(),
        }
    }

    /// Whether the token should be revalidated before use.
    #[must_use]
    pub fn needs_revalidation(&self, now: DateTime<Utc>, after: std::time::Duration) -> bool {
        let after = Duration::from_std(after).unwrap_or(Duration::MAX);
        now.signed_duration_since(self.validated_at) >= after
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the last known cart snapshot.
    pub const CART: &str = "cart";

    /// Key for a one-shot message shown on the next page.
    pub const FLASH: &str = "flash";
}
