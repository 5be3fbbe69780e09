//! Session restore.
//!
//! Before a request reaches a handler, a stored user whose profile is older
//! than the revalidation interval is checked against the backend. If the
//! token no longer works, or the backend cannot be reached, the visitor is
//! signed out and the request continues as a guest.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::{Span, debug, warn};

use crate::middleware::auth::clear_current_user;
use crate::models::{SessionUser, session_keys};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Shown on the login page after a forced sign-out.
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

/// Revalidate the stored user when due.
pub async fn session_restore(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(session) = request.extensions().get::<Session>().cloned() {
        restore(&state, &session).await;
    }
    next.run(request).await
}

async fn restore(state: &AppState, session: &Session) {
    let user = match session.get::<SessionUser>(session_keys::CURRENT_USER).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Failed to read session user");
            return;
        }
    };

    if !user.needs_revalidation(Utc::now(), state.config().session.revalidate_after) {
        Span::current().record("user_id", user.profile.id.as_i64());
        return;
    }

    match AuthService::new(state.api()).revalidate(&user).await {
        Ok(fresh) => {
            debug!(user_id = %fresh.profile.id, "Session revalidated");
            Span::current().record("user_id", fresh.profile.id.as_i64());
            if let Err(e) = session.insert(session_keys::CURRENT_USER, &fresh).await {
                warn!(error = %e, "Failed to store revalidated user");
            }
        }
        Err(e) => {
            warn!(error = %e, user_id = %user.profile.id, "Session restore failed, signing out");
            if let Err(e) = clear_current_user(session).await {
                warn!(error = %e, "Failed to clear session after restore failure");
            }
            if let Err(e) = session.insert(session_keys::FLASH, SESSION_EXPIRED).await {
                warn!(error = %e, "Failed to store session flash");
            }
        }
    }
}
