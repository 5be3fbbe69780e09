//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::{instrument, warn};

use crate::api::ProductQuery;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::Nav;
use crate::routes::products::{LOAD_FAILED, ProductView};
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    pub featured: Vec<ProductView>,
    pub error: Option<String>,
}

/// Display the home page: hero plus the first few products.
#[instrument(skip(state, auth))]
pub async fn home(State(state): State<AppState>, auth: OptionalAuth) -> impl IntoResponse {
    let limit = state.config().display.featured_products;

    let (featured, error) = match state.api().list_products(&ProductQuery::default()).await {
        Ok(products) => (
            products
                .iter()
                .take(limit)
                .map(|p| ProductView::new(p, state.currency()))
                .collect(),
            None,
        ),
        Err(e) => {
            warn!(error = %e, "Failed to load featured products");
            (Vec::new(), Some(LOAD_FAILED.to_string()))
        }
    };

    HomeTemplate {
        nav: Nav::from(&auth),
        featured,
        error,
    }
}
