//! Cart mutations and checkout.
//!
//! Every edit follows the same policy: apply it to the session snapshot,
//! confirm it with the backend, and on failure replace the snapshot with a
//! fresh copy of the backend cart.

use tracing::{info, instrument, warn};

use soko_core::{CartItemId, OrderId, ProductId, Quantity};

use crate::api::{
    AddCartItem, ApiError, AuthToken, CheckoutRequest, SokoClient, UpdateCartItem,
};
use crate::models::{CartError, CartSnapshot};

/// Banner shown when the cart cannot be fetched at all.
pub const LOAD_FAILED: &str =
    "We couldn't load your cart. Please check your connection and try again.";

/// Banner shown after a quantity change was rolled back.
pub const UPDATE_FAILED: &str =
    "Failed to update item quantity. Your cart has been reverted to its previous state.";

/// Banner shown when an edit names a line the backend cart no longer has.
pub const MISSING_ITEM: &str = "That item is no longer in your cart.";

/// Banner shown when checkout is attempted with nothing in the cart.
pub const EMPTY_CART: &str = "Your cart is empty. Please add items before checking out.";

/// Fallback banner for a failed checkout.
pub const CHECKOUT_FAILED: &str = "Checkout failed. Please try again.";

/// A local edit to a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEdit {
    SetQuantity {
        item_id: CartItemId,
        quantity: Quantity,
    },
    Remove {
        item_id: CartItemId,
    },
}

impl CartEdit {
    const fn item_id(self) -> CartItemId {
        match self {
            Self::SetQuantity { item_id, .. } | Self::Remove { item_id } => item_id,
        }
    }
}

/// Result of a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartUpdate {
    /// The backend accepted the edit; the optimistic snapshot stands.
    Confirmed(CartSnapshot),
    /// The backend refused; this is the refetched cart.
    RolledBack {
        snapshot: CartSnapshot,
        message: String,
    },
    /// Neither the edit nor the refetch succeeded.
    Unavailable,
}

/// Why checkout did not place an order.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Refused locally; the backend was not called.
    #[error("cart is empty")]
    EmptyCart,

    /// The backend refused or failed.
    #[error("checkout failed: {0}")]
    Api(#[from] ApiError),
}

impl CheckoutError {
    /// Text for the checkout page banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCart => EMPTY_CART.to_string(),
            Self::Api(err) if !err.is_upstream_failure() => err
                .detail()
                .map_or_else(|| CHECKOUT_FAILED.to_string(), str::to_string),
            Self::Api(_) => CHECKOUT_FAILED.to_string(),
        }
    }
}

/// Cart operations for one signed-in user.
pub struct CartService<'a> {
    client: &'a SokoClient,
    token: &'a AuthToken,
}

impl<'a> CartService<'a> {
    /// Create a cart service acting with `token`.
    #[must_use]
    pub const fn new(client: &'a SokoClient, token: &'a AuthToken) -> Self {
        Self { client, token }
    }

    /// Fetch the authoritative cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn fetch(&self) -> Result<CartSnapshot, ApiError> {
        self.client
            .get_cart(self.token)
            .await
            .map(CartSnapshot::from_cart)
    }

    /// Add a product, then refetch so merged lines show correctly.
    ///
    /// # Errors
    ///
    /// Returns an error if the add or the refetch fails.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId, quantity: Quantity) -> Result<CartSnapshot, ApiError> {
        self.client
            .add_cart_item(
                self.token,
                &AddCartItem {
                    product_id,
                    quantity,
                },
            )
            .await?;
        self.fetch().await
    }

    /// Apply `edit` optimistically and confirm it with the backend.
    #[instrument(skip(self, snapshot))]
    pub async fn apply(&self, snapshot: &CartSnapshot, edit: CartEdit) -> CartUpdate {
        let mut optimistic = snapshot.clone();

        let applied: Result<Option<String>, CartError> = match edit {
            CartEdit::SetQuantity { item_id, quantity } => optimistic
                .set_quantity(item_id, quantity)
                .map(|_| None),
            CartEdit::Remove { item_id } => {
                optimistic.remove_item(item_id).map(|line| Some(line.name))
            }
        };

        let removed_name = match applied {
            Ok(name) => name,
            Err(e) => {
                // Stale snapshot; the backend copy decides what exists
                warn!(error = %e, "Cart edit on unknown line");
                return self.rollback(edit, None).await;
            }
        };

        let confirmed = match edit {
            CartEdit::SetQuantity { item_id, quantity } => self
                .client
                .update_cart_item(self.token, item_id, &UpdateCartItem { quantity })
                .await
                .map(|_| ()),
            CartEdit::Remove { item_id } => {
                self.client.remove_cart_item(self.token, item_id).await
            }
        };

        match confirmed {
            Ok(()) => CartUpdate::Confirmed(optimistic),
            Err(e) => {
                warn!(error = %e, item_id = %edit.item_id(), "Cart edit rejected, rolling back");
                self.rollback(edit, removed_name.as_deref()).await
            }
        }
    }

    async fn rollback(&self, edit: CartEdit, removed_name: Option<&str>) -> CartUpdate {
        match self.fetch().await {
            Ok(snapshot) => CartUpdate::RolledBack {
                message: failure_message(edit, removed_name),
                snapshot,
            },
            Err(e) => {
                warn!(error = %e, "Cart refetch failed");
                CartUpdate::Unavailable
            }
        }
    }

    /// Place an order from the snapshot's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` without calling the backend when
    /// the snapshot has no lines.
    #[instrument(skip(self, snapshot))]
    pub async fn checkout(&self, snapshot: &CartSnapshot) -> Result<Option<OrderId>, CheckoutError> {
        let cart_id = match snapshot.cart_id {
            Some(cart_id) if !snapshot.is_empty() => cart_id,
            _ => return Err(CheckoutError::EmptyCart),
        };

        let receipt = self
            .client
            .checkout(self.token, &CheckoutRequest { cart_id })
            .await?;
        info!(
            order_id = ?receipt.order_id,
            detail = receipt.detail.as_deref().unwrap_or_default(),
            "Checkout accepted"
        );
        Ok(receipt.order_id)
    }
}

fn failure_message(edit: CartEdit, removed_name: Option<&str>) -> String {
    match (edit, removed_name) {
        (CartEdit::Remove { .. }, Some(name)) => {
            format!("Failed to remove \"{name}\". Please try again.")
        }
        (CartEdit::Remove { .. }, None) => "Failed to remove item. Please try again.".to_string(),
        (CartEdit::SetQuantity { .. }, _) => UPDATE_FAILED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let remove = CartEdit::Remove {
            item_id: CartItemId::new(1),
        };
        assert_eq!(
            failure_message(remove, Some("Kiondo Basket")),
            "Failed to remove \"Kiondo Basket\". Please try again."
        );
        let set = CartEdit::SetQuantity {
            item_id: CartItemId::new(1),
            quantity: Quantity::ONE,
        };
        assert_eq!(failure_message(set, None), UPDATE_FAILED);
    }

    #[test]
    fn test_checkout_messages() {
        assert_eq!(CheckoutError::EmptyCart.user_message(), EMPTY_CART);
        let rejected = CheckoutError::Api(ApiError::Status {
            status: 400,
            detail: Some("Insufficient stock for product: 'Mug'.".into()),
        });
        assert_eq!(
            rejected.user_message(),
            "Insufficient stock for product: 'Mug'."
        );
        let bare = CheckoutError::Api(ApiError::Status {
            status: 400,
            detail: None,
        });
        assert_eq!(bare.user_message(), CHECKOUT_FAILED);
        let down = CheckoutError::Api(ApiError::Status {
            status: 503,
            detail: Some("upstream".into()),
        });
        assert_eq!(down.user_message(), CHECKOUT_FAILED);
    }
}
