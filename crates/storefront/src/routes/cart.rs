//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads;
//! plain form posts get the full cart page. The session holds the last known
//! cart snapshot, which every edit updates optimistically.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use soko_core::{CartItemId, ProductId, Quantity};

use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, is_htmx};
use crate::models::{CartLine, CartSnapshot, SessionUser, session_keys};
use crate::routes::Nav;
use crate::services::cart::{CartEdit, CartService, CartUpdate, LOAD_FAILED, MISSING_ITEM};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
    pub can_decrement: bool,
}

impl CartLineView {
    fn new(line: &CartLine, currency: &str) -> Self {
        Self {
            item_id: line.item_id,
            product_id: line.product_id,
            name: line.name.clone(),
            image: line.image.clone(),
            unit_price: line.unit_price.display(currency),
            quantity: line.quantity.get(),
            line_total: line.total().display(currency),
            can_decrement: line.can_decrement(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    /// Build a view, formatting prices with `currency`.
    #[must_use]
    pub fn new(snapshot: &CartSnapshot, currency: &str) -> Self {
        Self {
            lines: snapshot
                .lines
                .iter()
                .map(|line| CartLineView::new(line, currency))
                .collect(),
            total: snapshot.total().display(currency),
            item_count: snapshot.item_count(),
        }
    }

    /// Whether there are no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    /// Raw field; browsers submit an emptied number input as `quantity=`.
    pub quantity: Option<String>,
}

impl AddToCartForm {
    /// Requested quantity, defaulting to one when the field is absent or blank.
    fn quantity(&self) -> Option<Quantity> {
        match self.quantity.as_deref().map(str::trim) {
            None | Some("") => Some(Quantity::ONE),
            Some(raw) => raw.parse().ok().and_then(|n| Quantity::new(n).ok()),
        }
    }
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: CartItemId,
    pub quantity: u32,
}

/// Stepper form data.
#[derive(Debug, Deserialize)]
pub struct StepForm {
    pub item_id: CartItemId,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: CartItemId,
    #[serde(default)]
    pub confirmed: Option<String>,
}

impl RemoveFromCartForm {
    fn is_confirmed(&self) -> bool {
        self.confirmed.as_deref() == Some("true")
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub nav: Nav,
    pub cart: Option<CartView>,
    pub error: Option<String>,
    pub confirm: Option<CartLineView>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: Option<CartView>,
    pub error: Option<String>,
    pub confirm: Option<CartLineView>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// What a cart response shows.
struct CartPage {
    snapshot: Option<CartSnapshot>,
    error: Option<String>,
    confirm: Option<CartItemId>,
}

impl CartPage {
    const fn ok(snapshot: CartSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            error: None,
            confirm: None,
        }
    }

    const fn unavailable() -> Self {
        Self {
            snapshot: None,
            error: None,
            confirm: None,
        }
    }

    fn from_update(update: CartUpdate) -> Self {
        match update {
            CartUpdate::Confirmed(snapshot) => Self::ok(snapshot),
            CartUpdate::RolledBack { snapshot, message } => Self {
                snapshot: Some(snapshot),
                error: Some(message),
                confirm: None,
            },
            CartUpdate::Unavailable => Self::unavailable(),
        }
    }

    fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart snapshot from the session.
pub async fn load_snapshot(session: &Session) -> Option<CartSnapshot> {
    session
        .get::<CartSnapshot>(session_keys::CART)
        .await
        .ok()
        .flatten()
}

/// Store the cart snapshot in the session, or drop it.
pub async fn store_snapshot(session: &Session, snapshot: Option<&CartSnapshot>) {
    let result = match snapshot {
        Some(snapshot) => session.insert(session_keys::CART, snapshot).await,
        None => session
            .remove::<CartSnapshot>(session_keys::CART)
            .await
            .map(|_| ()),
    };
    if let Err(e) = result {
        tracing::error!("Failed to save cart snapshot to session: {e}");
    }
}

/// Session snapshot, fetching it when absent.
async fn current_snapshot(
    state: &AppState,
    session: &Session,
    user: &SessionUser,
) -> Option<CartSnapshot> {
    if let Some(snapshot) = load_snapshot(session).await {
        return Some(snapshot);
    }
    refresh_snapshot(state, session, user).await
}

/// Fetch the authoritative cart into the session.
pub async fn refresh_snapshot(
    state: &AppState,
    session: &Session,
    user: &SessionUser,
) -> Option<CartSnapshot> {
    let fetched = match CartService::new(state.api(), &user.token).fetch().await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Failed to fetch cart");
            None
        }
    };
    store_snapshot(session, fetched.as_ref()).await;
    fetched
}

/// Session snapshot that contains `item_id`.
///
/// A session copy that lacks the line is stale (the line may have been added
/// from another tab), so the backend cart is fetched instead.
async fn snapshot_for_line(
    state: &AppState,
    session: &Session,
    user: &SessionUser,
    item_id: CartItemId,
) -> Option<CartSnapshot> {
    match load_snapshot(session).await {
        Some(snapshot) if snapshot.line(item_id).is_some() => Some(snapshot),
        _ => refresh_snapshot(state, session, user).await,
    }
}

async fn apply_edit(
    state: &AppState,
    session: &Session,
    user: &SessionUser,
    item_id: CartItemId,
    edit: impl FnOnce(&CartLine) -> Option<CartEdit>,
) -> CartPage {
    let Some(snapshot) = snapshot_for_line(state, session, user, item_id).await else {
        return CartPage::unavailable();
    };

    let edit = match snapshot.line(item_id) {
        Some(line) => edit(line),
        None => return CartPage::ok(snapshot).with_error(MISSING_ITEM),
    };
    // No edit means nothing to send, e.g. decrement at 1
    let Some(edit) = edit else {
        return CartPage::ok(snapshot);
    };

    let update = CartService::new(state.api(), &user.token)
        .apply(&snapshot, edit)
        .await;
    let page = CartPage::from_update(update);
    store_snapshot(session, page.snapshot.as_ref()).await;
    page
}

fn respond(state: &AppState, headers: &HeaderMap, user: &SessionUser, page: CartPage) -> Response {
    let cart = page
        .snapshot
        .as_ref()
        .map(|snapshot| CartView::new(snapshot, state.currency()));
    let confirm = page.confirm.and_then(|item_id| {
        cart.as_ref()
            .and_then(|c| c.lines.iter().find(|l| l.item_id == item_id).cloned())
    });
    let error = page
        .error
        .or_else(|| page.snapshot.is_none().then(|| LOAD_FAILED.to_string()));

    if is_htmx(headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate {
                cart,
                error,
                confirm,
            },
        )
            .into_response()
    } else {
        CartShowTemplate {
            nav: Nav::new(Some(user)),
            cart,
            error,
            confirm,
        }
        .into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session, user, headers))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
) -> Response {
    let page = refresh_snapshot(&state, &session, &user)
        .await
        .map_or_else(CartPage::unavailable, CartPage::ok);
    respond(&state, &headers, &user, page)
}

/// Add item to cart.
///
/// Returns the count badge with an HTMX trigger, or redirects plain posts to
/// the cart page.
#[instrument(skip(state, session, user, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let Some(quantity) = form.quantity() else {
        return (
            StatusCode::BAD_REQUEST,
            Html("<span class=\"cart-error\">Quantity must be at least 1</span>"),
        )
            .into_response();
    };

    let service = CartService::new(state.api(), &user.token);
    match service.add(form.product_id, quantity).await {
        Ok(snapshot) => {
            let product_id = form.product_id.to_string();
            add_breadcrumb(
                "cart",
                "Added to cart",
                Some(&[("product_id", product_id.as_str())]),
            );
            store_snapshot(&session, Some(&snapshot)).await;

            if is_htmx(&headers) {
                (
                    AppendHeaders([("HX-Trigger", "cart-updated")]),
                    CartCountTemplate {
                        count: snapshot.item_count(),
                    },
                )
                    .into_response()
            } else {
                Redirect::to("/cart").into_response()
            }
        }
        Err(e) => {
            tracing::error!("Failed to add item to cart: {e}");
            if is_htmx(&headers) {
                // htmx only swaps 2xx responses
                Html("<span class=\"cart-error\">Error adding to cart</span>").into_response()
            } else {
                let page = refresh_snapshot(&state, &session, &user)
                    .await
                    .map_or_else(CartPage::unavailable, CartPage::ok)
                    .with_error("Failed to add item to cart. Please try again.");
                respond(&state, &headers, &user, page)
            }
        }
    }
}

/// Set a line's quantity.
#[instrument(skip(state, session, user, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let Ok(quantity) = Quantity::new(form.quantity) else {
        // Zero would mean "remove"; that goes through confirmation instead
        let page = current_snapshot(&state, &session, &user)
            .await
            .map_or_else(CartPage::unavailable, CartPage::ok)
            .with_error("Quantity must be at least 1.");
        return respond(&state, &headers, &user, page);
    };

    let page = apply_edit(&state, &session, &user, form.item_id, |line| {
        Some(CartEdit::SetQuantity {
            item_id: line.item_id,
            quantity,
        })
    })
    .await;
    respond(&state, &headers, &user, page)
}

/// Stepper: one more unit.
#[instrument(skip(state, session, user, headers))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<StepForm>,
) -> Response {
    let page = apply_edit(&state, &session, &user, form.item_id, |line| {
        Some(CartEdit::SetQuantity {
            item_id: line.item_id,
            quantity: line.quantity.increment(),
        })
    })
    .await;
    respond(&state, &headers, &user, page)
}

/// Stepper: one fewer unit. Never goes below 1.
#[instrument(skip(state, session, user, headers))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<StepForm>,
) -> Response {
    let page = apply_edit(&state, &session, &user, form.item_id, |line| {
        line.quantity
            .decrement()
            .map(|quantity| CartEdit::SetQuantity {
                item_id: line.item_id,
                quantity,
            })
    })
    .await;
    respond(&state, &headers, &user, page)
}

/// Remove a line. Without `confirmed=true` only asks for confirmation.
#[instrument(skip(state, session, user, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    if !form.is_confirmed() {
        let page = match snapshot_for_line(&state, &session, &user, form.item_id).await {
            Some(snapshot) if snapshot.line(form.item_id).is_some() => CartPage {
                confirm: Some(form.item_id),
                ..CartPage::ok(snapshot)
            },
            Some(snapshot) => CartPage::ok(snapshot).with_error(MISSING_ITEM),
            None => CartPage::unavailable(),
        };
        return respond(&state, &headers, &user, page);
    }

    let page = apply_edit(&state, &session, &user, form.item_id, |line| {
        Some(CartEdit::Remove {
            item_id: line.item_id,
        })
    })
    .await;
    respond(&state, &headers, &user, page)
}

/// Get cart count badge (HTMX). Zero for guests.
#[instrument(skip(state, session, auth))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> impl IntoResponse {
    let count = match auth.0 {
        Some(user) => current_snapshot(&state, &session, &user)
            .await
            .map_or(0, |snapshot| snapshot.item_count()),
        None => 0,
    };

    CartCountTemplate { count }
}
