//! Authentication route handlers.
//!
//! Login, registration and logout against the Soko backend's token auth.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::filters;
use crate::middleware::{OptionalAuth, clear_current_user, safe_next, set_current_user};
use crate::models::{SessionUser, session_keys};
use crate::routes::Nav;
use crate::services::auth::{AuthError, AuthService, LoginForm, RegisterForm};
use crate::state::AppState;

/// Query parameters for the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub next: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nav: Nav,
    pub username: String,
    pub email: String,
    pub error: Option<String>,
}

async fn take_flash(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}

fn after_login(next: Option<&str>) -> Redirect {
    Redirect::to(safe_next(next).unwrap_or("/"))
}

/// Store the user in the session, or explain why that failed.
async fn sign_in(session: &Session, user: &SessionUser) -> Result<(), String> {
    set_current_user(session, user).await.map_err(|e| {
        error!("Failed to set session: {e}");
        "Something went wrong. Please try again.".to_string()
    })?;
    info!(user_id = %user.profile.id, "User signed in");
    Ok(())
}

/// Handle an auth failure: a token whose profile could not be loaded is
/// treated as a forced logout.
async fn auth_failure(session: &Session, err: &AuthError) -> String {
    if err.is_server_side() {
        error!(error = %err, "Authentication failed");
    } else {
        warn!(error = %err, "Authentication rejected");
    }
    if matches!(err, AuthError::ProfileUnavailable(_))
        && let Err(e) = clear_current_user(session).await
    {
        warn!(error = %e, "Failed to clear session");
    }
    err.user_message()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    session: Session,
    auth: OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if auth.0.is_some() {
        return after_login(query.next.as_deref()).into_response();
    }

    LoginTemplate {
        nav: Nav::default(),
        username: String::new(),
        next: safe_next(query.next.as_deref()).map(str::to_string),
        error: None,
        notice: take_flash(&session).await,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let result = AuthService::new(state.api())
        .login(&form.username, &form.password)
        .await;

    let error = match result {
        Ok(user) => match sign_in(&session, &user).await {
            Ok(()) => return after_login(form.next.as_deref()).into_response(),
            Err(message) => message,
        },
        Err(e) => auth_failure(&session, &e).await,
    };

    LoginTemplate {
        nav: Nav::default(),
        username: form.username.trim().to_string(),
        next: safe_next(form.next.as_deref()).map(str::to_string),
        error: Some(error),
        notice: None,
    }
    .into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(auth: OptionalAuth) -> Response {
    if auth.0.is_some() {
        return Redirect::to("/").into_response();
    }

    RegisterTemplate {
        nav: Nav::default(),
        username: String::new(),
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let result = AuthService::new(state.api()).register(&form).await;

    let error = match result {
        Ok(user) => match sign_in(&session, &user).await {
            Ok(()) => return Redirect::to("/").into_response(),
            Err(message) => message,
        },
        Err(e) => auth_failure(&session, &e).await,
    };

    RegisterTemplate {
        nav: Nav::default(),
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        error: Some(error),
    }
    .into_response()
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
pub async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_user(&session).await {
        error!("Failed to clear session: {e}");
    }
    if let Err(e) = session.flush().await {
        error!("Failed to flush session: {e}");
    }
    Redirect::to("/")
}
