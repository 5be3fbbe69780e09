//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;

/// Form problems caught before any backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// A required field is blank.
    #[error("All fields are required.")]
    MissingFields,

    /// `password` and `password2` differ.
    #[error("Passwords don't match.")]
    PasswordMismatch,

    /// Email failed local validation.
    #[error("Please enter a valid email address.")]
    InvalidEmail(#[source] soko_core::EmailError),
}

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Rejected before reaching the backend.
    #[error(transparent)]
    Form(#[from] FormError),

    /// The backend did not accept the username/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The backend rejected the registration details.
    #[error("registration rejected: {}", .0.as_deref().unwrap_or("(no detail)"))]
    RegistrationRejected(Option<String>),

    /// A token was issued (or stored) but the profile could not be fetched
    /// with it.
    #[error("profile unavailable: {0}")]
    ProfileUnavailable(#[source] ApiError),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Text shown on the login or registration form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Form(err) => err.to_string(),
            Self::InvalidCredentials => {
                "Invalid username or password. Please try again.".to_string()
            }
            Self::RegistrationRejected(_) => {
                "Registration failed. Please check your details and try again.".to_string()
            }
            Self::ProfileUnavailable(_) => {
                "We couldn't load your profile. Please sign in again.".to_string()
            }
            Self::Api(ApiError::RateLimited(_)) => {
                "Too many attempts. Please wait a moment and try again.".to_string()
            }
            Self::Api(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Whether this is worth an error report rather than a user mistake.
    #[must_use]
    pub fn is_server_side(&self) -> bool {
        match self {
            Self::ProfileUnavailable(err) | Self::Api(err) => err.is_upstream_failure(),
            _ => false,
        }
    }
}
