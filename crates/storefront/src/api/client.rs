//! Soko REST client implementation.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use soko_core::{CartItemId, ProductId};

use super::ApiError;
use super::cache::{CacheKey, CacheValue};
use super::types::{
    AddCartItem, AuthToken, Cart, CartItem, Category, CheckoutReceipt, CheckoutRequest,
    ListEnvelope, LoginRequest, LoginResponse, NewReview, Order, Product, ProductQuery,
    ProfileUpdate, RegisterRequest, RegisterResponse, Review, UpdateCartItem, UserProfile,
};
use crate::config::ApiConfig;

/// Characters of a failed response body kept in logs.
const LOG_BODY_CHARS: usize = 500;

// =============================================================================
// SokoClient
// =============================================================================

/// Client for the Soko REST backend.
///
/// Cheap to clone. The category list is cached for
/// [`ApiConfig::category_cache_ttl`]; everything else is fetched per call.
#[derive(Clone)]
pub struct SokoClient {
    inner: Arc<SokoClientInner>,
}

struct SokoClientInner {
    client: reqwest::Client,
    base: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl SokoClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.category_cache_ttl)
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("soko-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(SokoClientInner {
                client,
                base: config.base_url.clone(),
                cache,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base.join(path)?)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        token: Option<&AuthToken>,
    ) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match token {
            Some(token) => builder.header("Authorization", token.header_value()),
            None => builder,
        }
    }

    /// Send a request and return the raw body of a successful response.
    async fn send_raw(&self, builder: RequestBuilder, path: &str) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    path,
                    body = %body.chars().take(LOG_BODY_CHARS).collect::<String>(),
                    "Soko backend returned server error"
                );
            } else {
                debug!(status = %status, path, "Soko backend rejected request");
            }
            return Err(ApiError::from_status(status, &body, path));
        }

        Ok(body)
    }

    /// Send a request and decode the JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, ApiError> {
        let body = self.send_raw(builder, path).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %body.chars().take(LOG_BODY_CHARS).collect::<String>(),
                "Failed to parse Soko backend response"
            );
            ApiError::Parse(e)
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&AuthToken>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.send(self.request(Method::GET, url, token), path).await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        token: Option<&AuthToken>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.send(self.request(method, url, token).json(body), path)
            .await
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// List products, optionally filtered by category and price range.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, ApiError> {
        let path = "products/";
        let mut url = self.endpoint(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(category) = query.category {
                pairs.append_pair("category", &category.to_string());
            }
            if let Some(min) = query.min_price {
                pairs.append_pair("min_price", &min.amount().to_string());
            }
            if let Some(max) = query.max_price {
                pairs.append_pair("max_price", &max.amount().to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let envelope: ListEnvelope<Product> =
            self.send(self.request(Method::GET, url, None), path).await?;
        if envelope.has_more() {
            debug!("Product list is paginated; showing first page only");
        }
        Ok(envelope.into_items())
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown id, or an error if the
    /// API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.get(&format!("products/{id}/"), None).await
    }

    /// List product categories (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let envelope: ListEnvelope<Category> = self.get("categories/", None).await?;
        let categories = envelope.into_items();

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// List approved reviews for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn list_reviews(&self, id: ProductId) -> Result<Vec<Review>, ApiError> {
        let envelope: ListEnvelope<Review> =
            self.get(&format!("products/{id}/reviews/"), None).await?;
        Ok(envelope.into_items())
    }

    /// Submit a review for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the review (e.g. a duplicate)
    /// or the API request fails.
    #[instrument(skip(self, token, review), fields(product_id = %id))]
    pub async fn create_review(
        &self,
        token: &AuthToken,
        id: ProductId,
        review: &NewReview,
    ) -> Result<Review, ApiError> {
        self.send_json(
            Method::POST,
            &format!("products/{id}/reviews/"),
            review,
            Some(token),
        )
        .await
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Fetch the user's active cart.
    ///
    /// Returns `None` when the user has no cart yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_cart(&self, token: &AuthToken) -> Result<Option<Cart>, ApiError> {
        let envelope: ListEnvelope<Cart> = self.get("orders/carts/", Some(token)).await?;
        Ok(envelope.into_items().into_iter().next())
    }

    /// Add a product to the active cart.
    ///
    /// The backend merges into an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(product_id = %item.product_id, quantity = item.quantity.get()))]
    pub async fn add_cart_item(
        &self,
        token: &AuthToken,
        item: &AddCartItem,
    ) -> Result<CartItem, ApiError> {
        self.send_json(Method::POST, "orders/cart-items/", item, Some(token))
            .await
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(item_id = %id, quantity = update.quantity.get()))]
    pub async fn update_cart_item(
        &self,
        token: &AuthToken,
        id: CartItemId,
        update: &UpdateCartItem,
    ) -> Result<CartItem, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("orders/cart-items/{id}/"),
            update,
            Some(token),
        )
        .await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(item_id = %id))]
    pub async fn remove_cart_item(&self, token: &AuthToken, id: CartItemId) -> Result<(), ApiError> {
        let path = format!("orders/cart-items/{id}/");
        let url = self.endpoint(&path)?;
        self.send_raw(self.request(Method::DELETE, url, Some(token)), &path)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Checkout & Orders
    // =========================================================================

    /// Place an order from the given cart.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] carrying the backend's message for an
    /// empty cart or insufficient stock, or an error if the request fails.
    #[instrument(skip(self, token), fields(cart_id = %request.cart_id))]
    pub async fn checkout(
        &self,
        token: &AuthToken,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, ApiError> {
        self.send_json(Method::POST, "checkout/", request, Some(token))
            .await
    }

    /// Fetch the user's past orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn order_history(&self, token: &AuthToken) -> Result<Vec<Order>, ApiError> {
        let envelope: ListEnvelope<Order> = self.get("orders/history/", Some(token)).await?;
        Ok(envelope.into_items())
    }

    // =========================================================================
    // Account Methods
    // =========================================================================

    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.send_json(
            Method::POST,
            "login/",
            &LoginRequest { username, password },
            None,
        )
        .await
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the details or the request
    /// fails.
    #[instrument(skip(self, request), fields(username = request.username))]
    pub async fn register(
        &self,
        request: &RegisterRequest<'_>,
    ) -> Result<RegisterResponse, ApiError> {
        self.send_json(Method::POST, "register/", request, None)
            .await
    }

    /// Fetch the profile of the token's user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for a revoked token, or an error if
    /// the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_profile(&self, token: &AuthToken) -> Result<UserProfile, ApiError> {
        self.get("profile/", Some(token)).await
    }

    /// Replace the profile of the token's user.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update or the request
    /// fails.
    #[instrument(skip(self, token, update))]
    pub async fn update_profile(
        &self,
        token: &AuthToken,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ApiError> {
        self.send_json(Method::PUT, "profile/", update, Some(token))
            .await
    }

    /// Check that the backend answers at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or failing.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let path = "categories/";
        let url = self.endpoint(path)?;
        self.send_raw(self.request(Method::GET, url, None), path)
            .await?;
        Ok(())
    }
}
