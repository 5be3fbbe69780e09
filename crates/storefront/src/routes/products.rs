//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{instrument, warn};

use soko_core::{CategoryId, Price, ProductId};

use crate::api::{ApiError, NewReview, Product, ProductQuery, Review};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::SessionUser;
use crate::models::catalog::filter_products;
use crate::routes::Nav;
use crate::state::AppState;

/// Banner for a failed catalog load.
pub const LOAD_FAILED: &str = "Failed to load products.";

// =============================================================================
// Views
// =============================================================================

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub stock: i64,
    pub in_stock: bool,
}

impl ProductView {
    /// Build a view, formatting the price with `currency`.
    #[must_use]
    pub fn new(product: &Product, currency: &str) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.display(currency),
            image: product.image_src().map(str::to_string),
            category: product.category.as_ref().map(|c| c.name.clone()),
            stock: product.stock,
            in_stock: product.in_stock(),
        }
    }
}

/// Category filter option.
#[derive(Clone)]
pub struct CategoryOption {
    pub id: CategoryId,
    pub name: String,
    pub selected: bool,
}

/// Review display data for templates.
#[derive(Clone)]
pub struct ReviewView {
    pub username: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            username: review.username.clone(),
            rating: review.rating,
            comment: review.comment.clone().filter(|c| !c.trim().is_empty()),
            date: review.created_at.format("%B %-d, %Y").to_string(),
        }
    }
}

// =============================================================================
// Query & Form Types
// =============================================================================

/// Catalog query parameters.
///
/// Kept as strings so an empty form field is "no filter" rather than a
/// rejected request.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl CatalogQuery {
    /// Backend filters; unparseable values are dropped.
    #[must_use]
    pub fn to_product_query(&self) -> ProductQuery {
        fn non_blank(value: Option<&String>) -> Option<&str> {
            value.map(|s| s.trim()).filter(|s| !s.is_empty())
        }

        ProductQuery {
            category: non_blank(self.category.as_ref()).and_then(|s| s.parse::<CategoryId>().ok()),
            min_price: non_blank(self.min_price.as_ref()).and_then(|s| Price::parse(s).ok()),
            max_price: non_blank(self.max_price.as_ref()).and_then(|s| Price::parse(s).ok()),
        }
    }

    /// The local search term, as typed.
    #[must_use]
    pub fn term(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }
}

/// Query parameters on the detail page.
#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub reviewed: Option<String>,
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ReviewForm {
    /// Validate the form into a backend request.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message when the rating is not 1-5.
    pub fn to_review(&self) -> Result<NewReview, &'static str> {
        let rating = self
            .rating
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or("Please choose a rating from 1 to 5.")?;

        Ok(NewReview {
            rating,
            comment: self
                .comment
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub nav: Nav,
    pub products: Vec<ProductView>,
    pub categories: Vec<CategoryOption>,
    pub query: String,
    pub min_price: String,
    pub max_price: String,
    pub error: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub nav: Nav,
    pub product: ProductView,
    pub reviews: Vec<ReviewView>,
    pub signed_in: bool,
    pub review_error: Option<String>,
    pub review_success: bool,
}

/// Not found page template.
#[derive(Template, WebTemplate)]
#[template(path = "error/not_found.html")]
pub struct NotFoundTemplate {
    pub nav: Nav,
    pub what: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the product catalog.
#[instrument(skip(state, auth))]
pub async fn index(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Query(query): Query<CatalogQuery>,
) -> impl IntoResponse {
    let backend_query = query.to_product_query();

    let categories = state
        .api()
        .list_categories()
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load categories");
            Vec::new()
        })
        .into_iter()
        .map(|category| CategoryOption {
            selected: backend_query.category == Some(category.id),
            id: category.id,
            name: category.name,
        })
        .collect();

    let (products, error) = match state.api().list_products(&backend_query).await {
        Ok(products) => (
            filter_products(products, query.term())
                .iter()
                .map(|p| ProductView::new(p, state.currency()))
                .collect(),
            None,
        ),
        Err(e) => {
            warn!(error = %e, "Failed to load products");
            (Vec::new(), Some(LOAD_FAILED.to_string()))
        }
    };

    ProductsIndexTemplate {
        nav: Nav::from(&auth),
        products,
        categories,
        query: query.term().to_string(),
        min_price: query.min_price.unwrap_or_default(),
        max_price: query.max_price.unwrap_or_default(),
        error,
    }
}

/// Display product detail page.
#[instrument(skip(state, auth))]
pub async fn show(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(id): Path<ProductId>,
    Query(query): Query<DetailQuery>,
) -> Result<Response, AppError> {
    render_detail(&state, auth.0.as_ref(), id, None, query.reviewed.is_some()).await
}

/// Post a review for a product.
#[instrument(skip(state, user, form))]
pub async fn post_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    let review = match form.to_review() {
        Ok(review) => review,
        Err(message) => {
            return render_detail(&state, Some(&user), id, Some(message.to_string()), false).await;
        }
    };

    match state.api().create_review(&user.token, id, &review).await {
        Ok(_) => Ok(Redirect::to(&format!("/products/{id}?reviewed=1")).into_response()),
        Err(e) if !e.is_upstream_failure() => {
            let message = e
                .detail()
                .map_or_else(|| "Your review could not be posted.".to_string(), str::to_string);
            render_detail(&state, Some(&user), id, Some(message), false).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn render_detail(
    state: &AppState,
    user: Option<&SessionUser>,
    id: ProductId,
    review_error: Option<String>,
    review_success: bool,
) -> Result<Response, AppError> {
    let product = match state.api().get_product(id).await {
        Ok(product) => product,
        Err(ApiError::NotFound(_)) => {
            return Ok((
                StatusCode::NOT_FOUND,
                NotFoundTemplate {
                    nav: Nav::new(user),
                    what: "product".to_string(),
                },
            )
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let reviews = state
        .api()
        .list_reviews(id)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load reviews");
            Vec::new()
        })
        .iter()
        .filter(|review| review.is_visible)
        .map(ReviewView::from)
        .collect();

    Ok(ProductShowTemplate {
        nav: Nav::new(user),
        product: ProductView::new(&product, state.currency()),
        reviews,
        signed_in: user.is_some(),
        review_error,
        review_success,
    }
    .into_response())
}
