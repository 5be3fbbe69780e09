//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::Nav;
use crate::routes::cart::{CartView, load_snapshot, refresh_snapshot, store_snapshot};
use crate::services::cart::{CartService, CheckoutError, EMPTY_CART, LOAD_FAILED};
use crate::state::AppState;

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub nav: Nav,
    pub cart: Option<CartView>,
    pub error: Option<String>,
}

/// Display the order summary.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    let snapshot = refresh_snapshot(&state, &session, &user).await;

    let error = match &snapshot {
        None => Some(LOAD_FAILED.to_string()),
        Some(snapshot) if snapshot.is_empty() => Some(EMPTY_CART.to_string()),
        Some(_) => None,
    };

    CheckoutTemplate {
        nav: Nav::new(Some(&user)),
        cart: snapshot.map(|s| CartView::new(&s, state.currency())),
        error,
    }
}

/// Place the order.
///
/// An empty cart is refused here without calling the backend.
#[instrument(skip(state, session, user))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    let snapshot = match load_snapshot(&session).await {
        Some(snapshot) => Some(snapshot),
        None => refresh_snapshot(&state, &session, &user).await,
    };

    let Some(snapshot) = snapshot else {
        return CheckoutTemplate {
            nav: Nav::new(Some(&user)),
            cart: None,
            error: Some(LOAD_FAILED.to_string()),
        }
        .into_response();
    };

    match CartService::new(state.api(), &user.token)
        .checkout(&snapshot)
        .await
    {
        Ok(order_id) => {
            store_snapshot(&session, None).await;
            let placed = order_id.map_or_else(|| "new".to_string(), |id| id.to_string());
            add_breadcrumb("checkout", "Order placed", Some(&[("order_id", placed.as_str())]));
            tracing::info!(order_id = %placed, "Order placed");
            Redirect::to(&format!("/orders?placed={placed}")).into_response()
        }
        Err(e) => {
            if !matches!(e, CheckoutError::EmptyCart) {
                warn!(error = %e, "Checkout failed");
            }
            CheckoutTemplate {
                nav: Nav::new(Some(&user)),
                error: Some(e.user_message()),
                cart: Some(CartView::new(&snapshot, state.currency())),
            }
            .into_response()
        }
    }
}
