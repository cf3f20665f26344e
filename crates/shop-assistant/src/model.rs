//! Domain Models
//!
//! Wire shapes of the shop API. Prices use `rust_decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog product as returned by `GET /api/products`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    /// Document id (`_id` on the wire)
    #[serde(alias = "_id")]
    pub id: String,

    /// Display name (`title` on the wire)
    #[serde(alias = "title")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(default)]
    pub stock: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "BDT".into()
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            price: None,
            category: None,
            brand: None,
            stock: 0,
        }
    }

    #[must_use]
    pub fn with_price(mut self, amount: Decimal, currency: impl Into<String>) -> Self {
        self.price = Some(Price {
            amount,
            currency: currency.into(),
        });
        self
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Identifier of a raw catalog entry, whichever key the API used
    pub fn id_of(raw: &serde_json::Value) -> Option<&str> {
        raw.get("_id")
            .or_else(|| raw.get("id"))
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Display name of a raw catalog entry
    pub fn name_of(raw: &serde_json::Value) -> Option<&str> {
        raw.get("title")
            .or_else(|| raw.get("name"))
            .and_then(serde_json::Value::as_str)
    }

    /// Case-insensitive match against name, description, category and brand
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        [
            Some(self.name.as_str()),
            self.description.as_deref(),
            self.category.as_deref(),
            self.brand.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Query parameters for `GET /api/products`
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProductQuery {
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ProductQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Self::default()
        }
    }
}

/// `{ data: Product[] }` envelope of the product listing
#[derive(Debug, Deserialize)]
pub struct ProductList {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// Body of `POST /api/cart/add`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest<'a> {
    pub product_id: &'a str,
    pub qty: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_from_api_shape() {
        let raw = serde_json::json!({
            "_id": "665f1c",
            "title": "USB-C Charger 65W",
            "price": {"amount": 2500, "currency": "BDT"},
            "stock": 12,
            "createdAt": "2024-06-01T00:00:00Z"
        });

        let product: Product = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(product.id, "665f1c");
        assert_eq!(product.name, "USB-C Charger 65W");
        assert_eq!(product.price.unwrap().amount, dec!(2500));
        assert_eq!(Product::id_of(&raw), Some("665f1c"));
        assert_eq!(Product::name_of(&raw), Some("USB-C Charger 65W"));
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let product = Product::new("p1", "Wireless Mouse").with_category("Accessories");
        assert!(product.matches("mouse"));
        assert!(product.matches("ACCESS"));
        assert!(!product.matches("keyboard"));
    }

    #[test]
    fn test_cart_request_is_camel_case() {
        let body = serde_json::to_value(AddToCartRequest {
            product_id: "p1",
            qty: 1,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"productId": "p1", "qty": 1}));
    }
}
