//! Authentication guards and session helpers.
//!
//! Two guards with the same rejection behavior:
//! - [`RequireAuth`], an extractor for a single handler
//! - [`require_auth`], a middleware for every route in a router
//!
//! Unauthenticated page requests are redirected to `/login?next=<path>`,
//! HTMX requests get an `HX-Redirect` header, JSON requests get `401`.
//! Form posts cannot be replayed by a redirect, so for them `next` is the
//! same-origin page the form was posted from, if any.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request},
    http::{Extensions, HeaderMap, HeaderValue, Method, StatusCode, Uri, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use url::Url;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{SessionUser, session_keys};

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.profile.username)
/// }
/// ```
pub struct RequireAuth(pub SessionUser);

/// Error returned when authentication is required but nobody is signed in.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to the login page (for page requests).
    RedirectToLogin(String),
    /// Tell HTMX to navigate to the login page.
    HxRedirect(String),
    /// Unauthorized response (for JSON requests).
    Unauthorized,
}

impl AuthRejection {
    fn for_request(method: &Method, headers: &HeaderMap, uri: &Uri) -> Self {
        let login = login_url(return_path(method, headers, uri).as_deref());
        if is_htmx(headers) {
            Self::HxRedirect(login)
        } else if wants_json(headers) {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin(login)
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(to) => Redirect::to(&to).into_response(),
            Self::HxRedirect(to) => match HeaderValue::from_str(&to) {
                Ok(value) => (StatusCode::OK, [("HX-Redirect", value)]).into_response(),
                Err(_) => Redirect::to("/login").into_response(),
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match current_user(parts.extensions.get::<Session>()).await {
            Some(user) => Ok(Self(user)),
            None => Err(AuthRejection::for_request(
                &parts.method,
                &parts.headers,
                original_uri(&parts.extensions, &parts.uri),
            )),
        }
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
pub struct OptionalAuth(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts.extensions.get::<Session>()).await))
    }
}

/// Middleware that requires a signed-in user for every route it wraps.
///
/// ```rust,ignore
/// Router::new()
///     .route("/orders", get(orders::index))
///     .route_layer(axum::middleware::from_fn(require_auth))
/// ```
pub async fn require_auth(request: Request, next: Next) -> Response {
    if current_user(request.extensions().get::<Session>())
        .await
        .is_some()
    {
        return next.run(request).await;
    }
    AuthRejection::for_request(
        request.method(),
        request.headers(),
        original_uri(request.extensions(), request.uri()),
    )
    .into_response()
}

/// The URI before any `nest` stripped its prefix.
fn original_uri<'a>(extensions: &'a Extensions, uri: &'a Uri) -> &'a Uri {
    extensions
        .get::<OriginalUri>()
        .map_or(uri, |OriginalUri(original)| original)
}

async fn current_user(session: Option<&Session>) -> Option<SessionUser> {
    session?
        .get::<SessionUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Store a newly signed-in user, cycling the session id.
///
/// Any cart snapshot or flash left by a previous account is dropped; the
/// cart is reloaded from the backend for the new token.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &SessionUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .remove::<serde_json::Value>(session_keys::CART)
        .await?;
    session.remove::<String>(session_keys::FLASH).await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.profile.id, &user.profile.username);
    Ok(())
}

/// Sign the visitor out: drop the user and the cart snapshot.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<SessionUser>(session_keys::CURRENT_USER)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::CART)
        .await?;
    clear_sentry_user();
    Ok(())
}

/// Whether the request came from HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json") && !accept.contains("text/html"))
}

/// Accept `next` only if it is a local path.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|path| {
        path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
    })
}

/// Where to send the visitor after login.
///
/// Page loads return to themselves. Anything else returns to the page that
/// issued it, taken from a same-origin `Referer`.
fn return_path(method: &Method, headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if *method == Method::GET || *method == Method::HEAD {
        let path = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |pq| pq.as_str());
        return Some(path.to_string());
    }
    same_origin_referer(headers)
}

fn same_origin_referer(headers: &HeaderMap) -> Option<String> {
    let referer = Url::parse(headers.get(header::REFERER)?.to_str().ok()?).ok()?;
    let host = headers.get(header::HOST)?.to_str().ok()?;

    let referer_host = match referer.port() {
        Some(port) => format!("{}:{port}", referer.host_str()?),
        None => referer.host_str()?.to_string(),
    };
    if !referer_host.eq_ignore_ascii_case(host) {
        return None;
    }

    let path = match referer.query() {
        Some(query) => format!("{}?{query}", referer.path()),
        None => referer.path().to_string(),
    };
    safe_next(Some(&path)).map(str::to_string)
}

fn login_url(next: Option<&str>) -> String {
    match next {
        Some(path) => format!("/login?next={}", urlencoding::encode(path)),
        None => "/login".to_string(),
    }
}
