//! Profile route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use soko_core::Email;

use crate::api::{ProfileUpdate, UserProfile};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{SessionUser, session_keys};
use crate::routes::Nav;
use crate::state::AppState;

/// Shown after a successful save.
pub const UPDATED: &str = "Profile updated successfully.";

/// Profile edit form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Query parameters for the profile page.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub updated: Option<String>,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/show.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub profile: UserProfile,
    pub success: Option<String>,
}

/// Profile edit template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/edit.html")]
pub struct ProfileEditTemplate {
    pub nav: Nav,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub error: Option<String>,
}

impl ProfileEditTemplate {
    fn new(user: &SessionUser, form: Option<&ProfileForm>, error: Option<String>) -> Self {
        let profile = &user.profile;
        Self {
            nav: Nav::new(Some(user)),
            username: profile.username.clone(),
            email: form.map_or_else(|| profile.email.clone(), |f| f.email.clone()),
            first_name: form.map_or_else(|| profile.first_name.clone(), |f| f.first_name.clone()),
            last_name: form.map_or_else(|| profile.last_name.clone(), |f| f.last_name.clone()),
            error,
        }
    }
}

/// Display the profile.
#[instrument(skip(user))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    Query(query): Query<ProfileQuery>,
) -> impl IntoResponse {
    ProfileTemplate {
        nav: Nav::new(Some(&user)),
        success: query.updated.map(|_| UPDATED.to_string()),
        profile: user.profile,
    }
}

/// Display the edit form.
#[instrument(skip(user))]
pub async fn edit_page(RequireAuth(user): RequireAuth) -> impl IntoResponse {
    ProfileEditTemplate::new(&user, None, None)
}

/// Save the profile. Username is not editable.
#[instrument(skip(state, session, user, form))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(_) => {
            return Ok(ProfileEditTemplate::new(
                &user,
                Some(&form),
                Some("Please enter a valid email address.".to_string()),
            )
            .into_response());
        }
    };

    let update = ProfileUpdate {
        username: user.profile.username.clone(),
        email: email.into_inner(),
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
    };

    match state.api().update_profile(&user.token, &update).await {
        Ok(profile) => {
            let refreshed = SessionUser::new(user.token, profile);
            session
                .insert(session_keys::CURRENT_USER, &refreshed)
                .await?;
            Ok(Redirect::to("/profile?updated=1").into_response())
        }
        Err(e) if !e.is_upstream_failure() => {
            warn!(error = %e, "Profile update rejected");
            let message = e.detail().map_or_else(
                || "Failed to update profile. Please try again.".to_string(),
                str::to_string,
            );
            Ok(ProfileEditTemplate::new(&user, Some(&form), Some(message)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
