//! Wire types for the Soko REST backend.
//!
//! These mirror the backend serializers. Fields the storefront can live
//! without are `#[serde(default)]` so a slimmer serializer does not break a
//! page. Prices go through [`Price`], which accepts both the string and the
//! number encodings the backend produces.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use soko_core::{
    CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderStatus, Price, ProductId,
    Quantity, ReviewId, UserId,
};

// =============================================================================
// Auth Token
// =============================================================================

/// Opaque backend auth token.
///
/// Redacted in `Debug`. Serializes as a plain string so it can live in the
/// server-side session store; it never reaches the browser.
#[derive(Clone)]
pub struct AuthToken(SecretString);

impl AuthToken {
    /// Wrap a token string issued by the backend.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Value for the `Authorization` header.
    pub(crate) fn header_value(&self) -> String {
        format!("Token {}", self.0.expose_secret())
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

impl Serialize for AuthToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.expose_secret())
    }
}

impl<'de> Deserialize<'de> for AuthToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
}

impl Product {
    /// Best available image URL.
    ///
    /// Prefers the CDN `image_url`; falls back to `image` only when it is
    /// already an absolute URL (otherwise it is a bare storage id).
    #[must_use]
    pub fn image_src(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or_else(|| {
                self.image
                    .as_deref()
                    .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
            })
            .filter(|s| !s.is_empty())
    }

    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Product filters the backend understands.
///
/// Free-text search is applied by the storefront, see
/// [`crate::models::catalog::filter_products`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<CategoryId>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
}

/// A product review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    #[serde(default)]
    pub username: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

const fn default_visible() -> bool {
    true
}

/// Body for `POST products/{id}/reviews/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

/// A line in the active cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: Product,
    pub quantity: Quantity,
    #[serde(default)]
    pub total_price: Option<Price>,
}

/// The user's active cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total_price: Option<Price>,
}

/// Body for `POST orders/cart-items/`.
#[derive(Debug, Clone, Serialize)]
pub struct AddCartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// Body for `PATCH orders/cart-items/{id}/`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCartItem {
    pub quantity: Quantity,
}

/// Body for `POST checkout/`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub cart_id: CartId,
}

/// Response of `POST checkout/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutReceipt {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

// =============================================================================
// Orders
// =============================================================================

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product: Product,
    pub quantity: Quantity,
    /// Unit price at purchase time.
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub total_price: Option<Price>,
}

impl OrderItem {
    /// Line total: the backend figure when present, otherwise purchase
    /// price (or current product price) times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.total_price.unwrap_or_else(|| {
            self.price
                .unwrap_or(self.product.price)
                .times(self.quantity)
        })
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, alias = "total_amount")]
    pub total_price: Option<Price>,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Order total: the backend figure when present, otherwise the sum of
    /// line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.total_price
            .unwrap_or_else(|| self.items.iter().map(OrderItem::line_total).sum())
    }
}

// =============================================================================
// Users
// =============================================================================

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl UserProfile {
    /// Full name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Body for `PUT profile/`.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Body for `POST login/`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST login/`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: AuthToken,
}

/// Body for `POST register/`.
#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password2: &'a str,
}

/// Response of `POST register/`.
///
/// Some backend revisions return a token, others only echo the user.
#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub token: Option<AuthToken>,
}

// =============================================================================
// List Envelope
// =============================================================================

/// A list endpoint response.
///
/// The backend answers list endpoints either with a bare array or with a
/// paginated `{"count", "next", "previous", "results"}` object depending on
/// its pagination settings. Both decode to the same items.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Page {
        results: Vec<T>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
    },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    /// The items of this page.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Page { results, .. } | Self::Bare(results) => results,
        }
    }

    /// Whether the backend reported more pages than were returned.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        matches!(self, Self::Page { next: Some(_), .. })
    }
}
