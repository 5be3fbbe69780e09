//! Local catalog filtering.

use crate::api::Product;

/// Keep the products whose name or description contains `term`.
///
/// Matching is case-insensitive on the term exactly as typed, surrounding
/// spaces included. An empty term keeps everything.
#[must_use]
pub fn filter_products(products: Vec<Product>, term: &str) -> Vec<Product> {
    let term = term.to_lowercase();
    if term.is_empty() {
        return products;
    }

    products
        .into_iter()
        .filter(|product| {
            product.name.to_lowercase().contains(&term)
                || product.description.to_lowercase().contains(&term)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use soko_core::{Price, ProductId};

    use super::*;

    fn product(id: i64, name: &str, description: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            price: Price::parse("1.00").unwrap(),
            stock: 1,
            image: None,
            image_url: None,
            category: None,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(1, "Maasai Shuka", "Red checked blanket"),
            product(2, "Kiondo Basket", "Woven sisal bag"),
            product(3, "Coffee", "AA grade beans from Nyeri"),
        ]
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id.as_i64()).collect()
    }

    #[test]
    fn test_matches_name_or_description_case_insensitively() {
        assert_eq!(ids(&filter_products(catalog(), "BASKET")), vec![2]);
        assert_eq!(ids(&filter_products(catalog(), "nyeri")), vec![3]);
        assert_eq!(ids(&filter_products(catalog(), "e")), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_term_keeps_everything() {
        assert_eq!(ids(&filter_products(catalog(), "")), vec![1, 2, 3]);
    }

    #[test]
    fn test_term_is_not_trimmed() {
        assert_eq!(ids(&filter_products(catalog(), "sisal bag")), vec![2]);
        assert_eq!(ids(&filter_products(catalog(), " blanket")), vec![1]);
        assert!(filter_products(catalog(), "blanket ").is_empty());
        assert_eq!(ids(&filter_products(catalog(), " ")), vec![1, 2, 3]);
    }

    #[test]
    fn test_no_match() {
        assert!(filter_products(catalog(), "tea").is_empty());
    }

    #[test]
    fn test_unicode_lowercase() {
        let products = vec![product(1, "ÉCHARPE", "")];
        assert_eq!(ids(&filter_products(products, "écharpe")), vec![1]);
    }
}
