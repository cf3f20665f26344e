//! HTTP client for the shop API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use tracing::debug;

use super::ShopBackend;
use crate::error::{Result, ShopError};
use crate::model::{AddToCartRequest, ProductList, ProductQuery};

/// Connection settings for the shop API
#[derive(Clone, Debug)]
pub struct ShopApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ShopApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            timeout_secs: 10,
        }
    }
}

impl ShopApiConfig {
    /// Read `SHOP_API_URL` and `SHOP_API_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SHOP_API_URL").unwrap_or(defaults.base_url),
            timeout_secs: std::env::var("SHOP_API_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Shop backend reached over HTTP
pub struct HttpShopBackend {
    http: reqwest::Client,
    config: ShopApiConfig,
}

impl HttpShopBackend {
    pub fn from_config(config: ShopApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShopError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(ShopApiConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// The store's auth middleware reads the `token` cookie; the header
    /// covers deployments that expect a bearer token.
    fn authorize(builder: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => builder
                .bearer_auth(token)
                .header(COOKIE, format!("token={token}")),
            None => builder,
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));

        if status.is_success() {
            Ok(body)
        } else {
            Err(ShopError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl ShopBackend for HttpShopBackend {
    async fn search_products(
        &self,
        query: &ProductQuery,
        token: Option<&str>,
    ) -> Result<Vec<serde_json::Value>> {
        debug!(q = %query.q, category = ?query.category, "GET /api/products");

        let request = self.http.get(self.url("/api/products")).query(query);
        let body = Self::read_json(Self::authorize(request, token).send().await?).await?;

        let list: ProductList = serde_json::from_value(body)
            .map_err(|e| ShopError::InvalidResponse(format!("product list: {e}")))?;
        Ok(list.data)
    }

    async fn add_to_cart(
        &self,
        product_id: &str,
        qty: u32,
        token: Option<&str>,
    ) -> Result<serde_json::Value> {
        debug!(product_id, qty, "POST /api/cart/add");

        let request = self
            .http
            .post(self.url("/api/cart/add"))
            .json(&AddToCartRequest { product_id, qty });
        Self::read_json(Self::authorize(request, token).send().await?).await
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(self.url("/api/products"))
            .query(&[("limit", "1")])
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn name(&self) -> &str {
        "shop-api"
    }
}
