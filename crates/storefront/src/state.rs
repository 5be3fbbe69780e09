//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiError, SokoClient};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// configuration and the backend client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: SokoClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = SokoClient::new(&config.api)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, api }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the Soko backend client.
    #[must_use]
    pub fn api(&self) -> &SokoClient {
        &self.inner.api
    }

    /// Currency label prefixed to displayed prices.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.inner.config.display.currency_label
    }
}
