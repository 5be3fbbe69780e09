//! Cart snapshot held in the session.
//!
//! The snapshot is the storefront's copy of the last known cart. Mutations
//! edit it first and are then confirmed against the backend; see
//! [`crate::services::cart`]. Totals are always derived from the lines, so the
//! grand total shown is exactly the sum of the line totals shown.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use soko_core::{CartId, CartItemId, Price, ProductId, Quantity};

use crate::api::Cart;

/// Errors from local cart edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The line is not in the snapshot.
    #[error("cart item {0} not found")]
    UnknownItem(CartItemId),
}

/// One line of the cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Price,
    pub quantity: Quantity,
    pub stock: i64,
}

impl CartLine {
    /// Quantity times unit price.
    #[must_use]
    pub fn total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Whether the stepper can go down without removing the line.
    #[must_use]
    pub const fn can_decrement(&self) -> bool {
        self.quantity.get() > 1
    }
}

/// The session's copy of the active cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Backend cart id; `None` until the user has a cart.
    pub cart_id: Option<CartId>,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Build a snapshot from the backend's active cart.
    #[must_use]
    pub fn from_cart(cart: Option<Cart>) -> Self {
        let Some(cart) = cart else {
            return Self::default();
        };

        let lines = cart
            .items
            .into_iter()
            .map(|item| CartLine {
                item_id: item.id,
                product_id: item.product.id,
                image: item.product.image_src().map(str::to_string),
                name: item.product.name,
                unit_price: item.product.price,
                quantity: item.quantity,
                stock: item.product.stock,
            })
            .collect();

        Self {
            cart_id: Some(cart.id),
            lines,
        }
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::total).sum()
    }

    /// Total number of units, for the header badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .map(|line| line.quantity.get())
            .fold(0, u32::saturating_add)
    }

    /// Whether there is nothing to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up a line.
    #[must_use]
    pub fn line(&self, item_id: CartItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.item_id == item_id)
    }

    /// Set a line's quantity, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownItem`] if the line is not in the cart.
    pub fn set_quantity(
        &mut self,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<Quantity, CartError> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.item_id == item_id)
            .ok_or(CartError::UnknownItem(item_id))?;
        Ok(std::mem::replace(&mut line.quantity, quantity))
    }

    /// Remove a line, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownItem`] if the line is not in the cart.
    pub fn remove_item(&mut self, item_id: CartItemId) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|line| line.item_id == item_id)
            .ok_or(CartError::UnknownItem(item_id))?;
        Ok(self.lines.remove(index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, price: &str, quantity: u32) -> CartLine {
        CartLine {
            item_id: CartItemId::new(id),
            product_id: ProductId::new(id * 10),
            name: format!("Item {id}"),
            image: None,
            unit_price: Price::parse(price).unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
            stock: 10,
        }
    }

    fn snapshot() -> CartSnapshot {
        CartSnapshot {
            cart_id: Some(CartId::new(1)),
            lines: vec![line(1, "850.00", 2), line(2, "19.99", 3)],
        }
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let cart = snapshot();
        let displayed: Price = cart.lines.iter().map(CartLine::total).sum();
        assert_eq!(cart.total(), displayed);
        assert_eq!(cart.total(), Price::parse("1759.97").unwrap());
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_set_quantity_recomputes_totals() {
        let mut cart = snapshot();
        let previous = cart
            .set_quantity(CartItemId::new(2), Quantity::new(1).unwrap())
            .unwrap();
        assert_eq!(previous.get(), 3);
        assert_eq!(cart.total(), Price::parse("1719.99").unwrap());
        assert_eq!(
            cart.line(CartItemId::new(2)).unwrap().total(),
            Price::parse("19.99").unwrap()
        );
    }

    #[test]
    fn test_remove_item() {
        let mut cart = snapshot();
        let removed = cart.remove_item(CartItemId::new(1)).unwrap();
        assert_eq!(removed.name, "Item 1");
        assert_eq!(cart.total(), Price::parse("59.97").unwrap());
        assert_eq!(
            cart.remove_item(CartItemId::new(1)),
            Err(CartError::UnknownItem(CartItemId::new(1)))
        );
    }

    #[test]
    fn test_unknown_item_is_rejected() {
        let mut cart = snapshot();
        assert!(
            cart.set_quantity(CartItemId::new(99), Quantity::ONE)
                .is_err()
        );
        assert_eq!(cart, snapshot());
    }

    #[test]
    fn test_can_decrement_stops_at_one() {
        assert!(line(1, "1.00", 2).can_decrement());
        assert!(!line(1, "1.00", 1).can_decrement());
    }

    #[test]
    fn test_from_missing_cart_is_empty() {
        let cart = CartSnapshot::from_cart(None);
        assert!(cart.is_empty());
        assert_eq!(cart.cart_id, None);
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_from_cart_uses_unit_prices() {
        let json = r#"{
            "id": 4,
            "items": [
                {"id": 7, "product": {"id": 3, "name": "Mug", "price": "250.00", "stock": 2}, "quantity": 2, "total_price": "999.00"}
            ],
            "total_price": "999.00"
        }"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        let snapshot = CartSnapshot::from_cart(Some(cart));
        assert_eq!(snapshot.cart_id, Some(CartId::new(4)));
        assert_eq!(snapshot.total(), Price::parse("500.00").unwrap());
    }
}
