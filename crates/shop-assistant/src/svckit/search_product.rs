//! Product Search Tool
//!
//! Searches the catalog via `GET /api/products`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use agent_core::{
    ParameterSchema, Result as CoreResult, RunContext, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::backend::ShopBackend;
use crate::model::ProductQuery;

/// Tool for searching the product catalog
pub struct SearchProductTool {
    backend: Arc<dyn ShopBackend>,
}

impl SearchProductTool {
    pub const NAME: &'static str = "searchProduct";

    pub fn new(backend: Arc<dyn ShopBackend>) -> Self {
        Self { backend }
    }

    fn query(call: &ToolCall) -> ProductQuery {
        ProductQuery {
            q: call.str_arg("query").unwrap_or_default().to_string(),
            category: call.str_arg("category").map(str::to_string),
            limit: call
                .arguments
                .get("limit")
                .and_then(serde_json::Value::as_u64)
                .and_then(|l| u32::try_from(l).ok())
                .filter(|l| *l > 0),
        }
    }
}

#[async_trait]
impl Tool for SearchProductTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Search for products based on a query. Returns the matching products with their ids.".into(),
            parameters: vec![
                ParameterSchema::required("query", "string", "The search query for products"),
                ParameterSchema::optional("category", "string", "Restrict results to this category"),
                ParameterSchema::optional("limit", "integer", "Maximum number of products to return"),
            ],
            category: Some("catalog".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &RunContext) -> CoreResult<ToolResult> {
        let query = Self::query(call);

        match self.backend.search_products(&query, ctx.token()).await {
            Ok(products) => Ok(ToolResult::success(
                Self::NAME,
                format!("{} products found", products.len()),
            )
            .with_data(serde_json::Value::Array(products))),
            Err(e) => {
                warn!(query = %query.q, error = %e, "product search failed");
                Ok(super::failure(Self::NAME, &e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockShopBackend;

    fn tool() -> (Arc<MockShopBackend>, SearchProductTool) {
        let backend = Arc::new(MockShopBackend::new());
        (backend.clone(), SearchProductTool::new(backend))
    }

    #[tokio::test]
    async fn test_search_returns_raw_product_list() {
        let (_, tool) = tool();
        let call = ToolCall::new("c1", SearchProductTool::NAME).with_arg("query", "mouse");

        let result = tool.execute(&call, &RunContext::with_token("tok")).await.unwrap();

        assert!(result.success);
        let content: serde_json::Value = serde_json::from_str(&result.content()).unwrap();
        assert_eq!(content[0]["_id"], "p-mouse");
    }

    #[tokio::test]
    async fn test_empty_result_is_success() {
        let (_, tool) = tool();
        let call = ToolCall::new("c1", SearchProductTool::NAME).with_arg("query", "submarine");

        let result = tool.execute(&call, &RunContext::new()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.content(), "[]");
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_payload() {
        let (backend, tool) = tool();
        backend.set_search_down(true);
        let call = ToolCall::new("c1", SearchProductTool::NAME).with_arg("query", "mouse");

        let result = tool.execute(&call, &RunContext::new()).await.unwrap();

        assert!(!result.success);
        let content: serde_json::Value = serde_json::from_str(&result.content()).unwrap();
        assert_eq!(content["success"], false);
        assert_eq!(content["error"]["message"], "Service unavailable");
    }

    #[tokio::test]
    async fn test_token_comes_from_context() {
        let (backend, tool) = tool();
        let call = ToolCall::new("c1", SearchProductTool::NAME).with_arg("query", "mouse");

        tool.execute(&call, &RunContext::with_token("ctx-token")).await.unwrap();

        assert_eq!(backend.search_tokens().await, vec![Some("ctx-token".to_string())]);
    }
}
