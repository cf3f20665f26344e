//! Shop Backend Integration
//!
//! Abstractions over the e-commerce API the tools act on.

mod http;
mod mock;

pub use http::{HttpShopBackend, ShopApiConfig};
pub use mock::{CartAdd, MockShopBackend};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::ProductQuery;

/// Shop backend trait (Strategy pattern)
///
/// The HTTP client talks to the real store; the mock keeps tests offline.
#[async_trait]
pub trait ShopBackend: Send + Sync {
    /// Search the catalog. Entries are returned as the API sent them.
    async fn search_products(
        &self,
        query: &ProductQuery,
        token: Option<&str>,
    ) -> Result<Vec<serde_json::Value>>;

    /// Add `qty` units of a product to the caller's cart
    async fn add_to_cart(
        &self,
        product_id: &str,
        qty: u32,
        token: Option<&str>,
    ) -> Result<serde_json::Value>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name
    fn name(&self) -> &str;
}
