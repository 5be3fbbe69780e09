//! Authentication service.
//!
//! Token-based login and registration against the Soko backend. A session
//! user is only produced once the token has been used to fetch a profile.

mod error;

pub use error::{AuthError, FormError};

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use soko_core::Email;

use crate::api::{ApiError, AuthToken, RegisterRequest, SokoClient};
use crate::models::SessionUser;

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Local path to return to after login.
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form fields.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    /// Check the form without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: blank fields, mismatched passwords,
    /// then an invalid email.
    pub fn validate(&self) -> Result<Email, FormError> {
        if [&self.username, &self.email, &self.password, &self.password2]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(FormError::MissingFields);
        }
        if self.password != self.password2 {
            return Err(FormError::PasswordMismatch);
        }
        Email::parse(&self.email).map_err(FormError::InvalidEmail)
    }
}

/// Authentication service.
pub struct AuthService<'a> {
    client: &'a SokoClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(client: &'a SokoClient) -> Self {
        Self { client }
    }

    /// Log in with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the backend rejects the
    /// pair, or `AuthError::ProfileUnavailable` if the issued token cannot
    /// fetch a profile.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(FormError::MissingFields.into());
        }

        let token = match self.client.login(username.trim(), password).await {
            Ok(response) => response.token,
            // DRF's token view answers bad credentials with 400
            Err(ApiError::Unauthorized(_) | ApiError::Status { status: 400, .. }) => {
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        self.session_user(token).await
    }

    /// Register a new account and sign it in.
    ///
    /// Uses the token from the registration response when there is one,
    /// otherwise logs in with the submitted credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Form` for local validation failures and
    /// `AuthError::RegistrationRejected` when the backend refuses the
    /// details.
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: &RegisterForm) -> Result<SessionUser, AuthError> {
        let email = form.validate()?;
        let username = form.username.trim();

        let request = RegisterRequest {
            username,
            email: email.as_str(),
            password: &form.password,
            password2: &form.password2,
        };

        let response = match self.client.register(&request).await {
            Ok(response) => response,
            Err(e) if !e.is_upstream_failure() => {
                debug!(detail = ?e.detail(), "Registration rejected");
                return Err(AuthError::RegistrationRejected(e.detail().map(str::to_string)));
            }
            Err(e) => return Err(e.into()),
        };

        let token = match response.token {
            Some(token) => token,
            None => self.client.login(username, &form.password).await?.token,
        };

        self.session_user(token).await
    }

    /// Confirm a stored token still works and refresh its profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ProfileUnavailable` if the profile fetch fails for
    /// any reason.
    #[instrument(skip(self, user), fields(user_id = %user.profile.id))]
    pub async fn revalidate(&self, user: &SessionUser) -> Result<SessionUser, AuthError> {
        self.session_user(user.token.clone()).await
    }

    async fn session_user(&self, token: AuthToken) -> Result<SessionUser, AuthError> {
        match self.client.get_profile(&token).await {
            Ok(profile) => Ok(SessionUser::new(token, profile)),
            Err(e) => {
                warn!(error = %e, "Profile fetch failed after token issue");
                Err(AuthError::ProfileUnavailable(e))
            }
        }
    }
}
