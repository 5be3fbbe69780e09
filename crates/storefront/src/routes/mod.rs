//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (backend reachable)
//!
//! # Products
//! GET  /products               - Catalog (q, category, min_price, max_price)
//! GET  /products/{id}          - Product detail with reviews
//! POST /products/{id}/reviews  - Post a review (auth)
//!
//! # Cart (auth, HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns badge, triggers cart-updated)
//! POST /cart/update            - Set quantity (returns cart_items fragment)
//! POST /cart/increment         - Stepper +
//! POST /cart/decrement         - Stepper - (no-op at 1)
//! POST /cart/remove            - Remove, after confirmation
//! GET  /cart/count             - Cart count badge (fragment, public)
//!
//! # Account (auth, router-level guard)
//! GET  /checkout               - Order summary
//! POST /checkout               - Place order
//! GET  /orders                 - Order history
//! GET  /profile                - Profile
//! GET  /profile/edit           - Edit form
//! POST /profile/edit           - Save profile
//!
//! # Auth
//! GET  /login, POST /login     - Login (rate limited)
//! GET  /register, POST /register - Registration (rate limited)
//! POST /logout                 - Logout
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod home;
pub mod orders;
pub mod products;
pub mod profile;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{OptionalAuth, auth_rate_limiter, require_auth};
use crate::models::SessionUser;
use crate::state::AppState;

/// Header data every page needs.
#[derive(Clone, Default)]
pub struct Nav {
    /// Display name of the signed-in user.
    pub username: Option<String>,
}

impl Nav {
    /// Navigation for an optional session user.
    #[must_use]
    pub fn new(user: Option<&SessionUser>) -> Self {
        Self {
            username: user.map(|u| u.profile.display_name()),
        }
    }
}

impl From<&OptionalAuth> for Nav {
    fn from(auth: &OptionalAuth) -> Self {
        Self::new(auth.0.as_ref())
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    // One limiter shared by both form posts; page GETs are not limited
    let limiter = auth_rate_limiter();

    Router::new()
        .route(
            "/login",
            post(auth::login)
                .layer(limiter.clone())
                .get(auth::login_page),
        )
        .route(
            "/register",
            post(auth::register)
                .layer(limiter)
                .get(auth::register_page),
        )
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", post(products::post_review))
}

/// Create the cart routes router.
///
/// Each handler guards itself with `RequireAuth`; the count badge is public.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the signed-in-only routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", get(checkout::show).post(checkout::place))
        .route("/orders", get(orders::index))
        .route("/profile", get(profile::show))
        .route("/profile/edit", get(profile::edit_page).post(profile::edit))
        .route_layer(axum::middleware::from_fn(require_auth))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .merge(account_routes())
        .merge(auth_routes())
}
