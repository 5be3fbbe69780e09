//! Order history route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use soko_core::{OrderId, Price};

use crate::api::{Order, OrderItem};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::Nav;
use crate::state::AppState;

/// Banner for a failed history load.
pub const LOAD_FAILED: &str = "Failed to fetch order history. Please try again.";

/// Order line display data for templates.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub date: String,
    pub status: String,
    pub is_final: bool,
    pub items: Vec<OrderItemView>,
    pub total: String,
}

impl OrderView {
    fn new(order: &Order, currency: &str) -> Self {
        Self {
            id: order.id,
            date: order.created_at.format("%B %-d, %Y").to_string(),
            status: order.status.to_string(),
            is_final: order.status.is_final(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView::new(item, currency))
                .collect(),
            total: order.total().display(currency),
        }
    }
}

impl OrderItemView {
    fn new(item: &OrderItem, currency: &str) -> Self {
        Self {
            name: item.product.name.clone(),
            quantity: item.quantity.get(),
            unit_price: item.price.unwrap_or(item.product.price).display(currency),
            line_total: item.line_total().display(currency),
        }
    }
}

/// Sum of all order totals.
#[must_use]
pub fn cumulative_total(orders: &[Order]) -> Price {
    orders.iter().map(Order::total).sum()
}

/// Query parameters for the history page.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    /// Set after a successful checkout.
    pub placed: Option<String>,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub nav: Nav,
    pub orders: Vec<OrderView>,
    pub cumulative_total: String,
    pub placed: Option<String>,
    pub error: Option<String>,
}

/// Display the order history.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<OrdersQuery>,
) -> impl IntoResponse {
    let (orders, cumulative, error) = match state.api().order_history(&user.token).await {
        Ok(orders) => (
            orders
                .iter()
                .map(|order| OrderView::new(order, state.currency()))
                .collect(),
            cumulative_total(&orders),
            None,
        ),
        Err(e) => {
            warn!(error = %e, "Failed to fetch order history");
            (Vec::new(), Price::ZERO, Some(LOAD_FAILED.to_string()))
        }
    };

    OrdersTemplate {
        nav: Nav::new(Some(&user)),
        orders,
        cumulative_total: cumulative.display(state.currency()),
        placed: query.placed,
        error,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_total_uses_fallback_totals() {
        let orders: Vec<Order> = serde_json::from_str(
            r#"[
                {"id": 1, "items": [], "total_price": "100.00", "status": "Delivered", "created_at": "2025-01-02T09:00:00Z"},
                {"id": 2, "items": [
                    {"id": 5, "product": {"id": 1, "name": "Tea", "price": "250.00"}, "quantity": 2, "price": "240.00"}
                ], "status": "Pending", "created_at": "2025-02-02T09:00:00Z"}
            ]"#,
        )
        .unwrap();
        assert_eq!(cumulative_total(&orders), Price::parse("580.00").unwrap());

        let view = OrderView::new(&orders[1], "Kshs.");
        assert_eq!(view.total, "Kshs. 480.00");
        assert_eq!(view.items[0].unit_price, "Kshs. 240.00");
        assert_eq!(view.date, "February 2, 2025");
        assert!(!view.is_final);
    }
}
