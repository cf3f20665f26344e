//! Mock Shop Backend
//!
//! In-memory catalog and cart for tests and offline demos. Entries are
//! rendered in the store's wire shape (`_id`, `title`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::Mutex;

use super::ShopBackend;
use crate::error::{Result, ShopError};
use crate::model::{Product, ProductQuery};

/// One recorded `add_to_cart` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartAdd {
    pub product_id: String,
    pub qty: u32,
    pub token: Option<String>,
}

/// Mock backend with a fixed catalog
pub struct MockShopBackend {
    catalog: Vec<Product>,
    delays: HashMap<String, Duration>,
    cart_delay: Option<Duration>,
    search_down: AtomicBool,
    cart: Mutex<HashMap<String, u32>>,
    adds: Mutex<Vec<CartAdd>>,
    search_tokens: Mutex<Vec<Option<String>>>,
}

impl Default for MockShopBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockShopBackend {
    /// Small electronics catalog
    pub fn new() -> Self {
        Self::with_catalog(vec![
            Product::new("p-charger-65", "USB-C Charger 65W")
                .with_price(dec!(2500), "BDT")
                .with_stock(12)
                .with_category("chargers"),
            Product::new("p-charger-20", "USB-C Charger 20W")
                .with_price(dec!(1200), "BDT")
                .with_stock(30)
                .with_category("chargers"),
            Product::new("p-mouse", "Wireless Mouse")
                .with_price(dec!(1800), "BDT")
                .with_stock(7)
                .with_category("accessories"),
            Product::new("p-headphones", "Noise Cancelling Headphones")
                .with_price(dec!(9500), "BDT")
                .with_stock(0)
                .with_category("audio"),
        ])
    }

    pub fn with_catalog(catalog: Vec<Product>) -> Self {
        Self {
            catalog,
            delays: HashMap::new(),
            cart_delay: None,
            search_down: AtomicBool::new(false),
            cart: Mutex::new(HashMap::new()),
            adds: Mutex::new(Vec::new()),
            search_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Delay searches for `query` (exact match) by `delay`
    #[must_use]
    pub fn with_search_delay(mut self, query: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(query.into(), delay);
        self
    }

    /// Delay every `add_to_cart` by `delay`
    #[must_use]
    pub fn with_cart_delay(mut self, delay: Duration) -> Self {
        self.cart_delay = Some(delay);
        self
    }

    /// Make every search fail with a 503
    pub fn set_search_down(&self, down: bool) {
        self.search_down.store(down, Ordering::SeqCst);
    }

    /// Recorded add-to-cart calls, in arrival order
    pub async fn cart_adds(&self) -> Vec<CartAdd> {
        self.adds.lock().await.clone()
    }

    /// Tokens seen by `search_products`, in arrival order
    pub async fn search_tokens(&self) -> Vec<Option<String>> {
        self.search_tokens.lock().await.clone()
    }

    /// Quantity of a product currently in the cart
    pub async fn cart_qty(&self, product_id: &str) -> u32 {
        self.cart.lock().await.get(product_id).copied().unwrap_or(0)
    }

    fn to_wire(product: &Product) -> serde_json::Value {
        json!({
            "_id": product.id,
            "title": product.name,
            "price": product.price,
            "category": product.category,
            "stock": product.stock,
        })
    }
}

#[async_trait]
impl ShopBackend for MockShopBackend {
    async fn search_products(
        &self,
        query: &ProductQuery,
        token: Option<&str>,
    ) -> Result<Vec<serde_json::Value>> {
        self.search_tokens.lock().await.push(token.map(str::to_string));

        if let Some(delay) = self.delays.get(&query.q) {
            tokio::time::sleep(*delay).await;
        }

        if self.search_down.load(Ordering::SeqCst) {
            return Err(ShopError::Api {
                status: 503,
                body: json!({"message": "Service unavailable"}),
            });
        }

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(self
            .catalog
            .iter()
            .filter(|p| query.q.is_empty() || p.matches(&query.q))
            .filter(|p| {
                query.category.as_deref().is_none_or(|c| {
                    p.category.as_deref().is_some_and(|pc| pc.eq_ignore_ascii_case(c))
                })
            })
            .take(limit)
            .map(Self::to_wire)
            .collect())
    }

    async fn add_to_cart(
        &self,
        product_id: &str,
        qty: u32,
        token: Option<&str>,
    ) -> Result<serde_json::Value> {
        self.adds.lock().await.push(CartAdd {
            product_id: product_id.to_string(),
            qty,
            token: token.map(str::to_string),
        });

        if let Some(delay) = self.cart_delay {
            tokio::time::sleep(delay).await;
        }

        if token.is_none() {
            return Err(ShopError::Api {
                status: 401,
                body: json!({"message": "Unauthorized"}),
            });
        }

        let product = self
            .catalog
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| ShopError::Api {
                status: 404,
                body: json!({"message": "Product not found"}),
            })?;

        let mut cart = self.cart.lock().await;
        let in_cart = cart.get(product_id).copied().unwrap_or(0);
        let Some(total) = in_cart.checked_add(qty).filter(|t| *t <= product.stock) else {
            return Err(ShopError::OutOfStock(product.name.clone()));
        };

        cart.insert(product_id.to_string(), total);
        let items: Vec<_> = cart
            .iter()
            .map(|(id, qty)| json!({"product": id, "qty": qty}))
            .collect();

        Ok(json!({
            "message": "Item added to cart",
            "cart": {"items": items},
        }))
    }

    async fn health_check(&self) -> bool {
        !self.search_down.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
