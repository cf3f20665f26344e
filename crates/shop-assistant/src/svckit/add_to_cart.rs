//! Add-to-Cart Tool
//!
//! Adds a product to the caller's cart via `POST /api/cart/add`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use agent_core::{
    ParameterSchema, Result as CoreResult, RunContext, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::backend::ShopBackend;

/// Product reference as the model sent it.
///
/// Models sometimes put the id under `input` instead of `productId`;
/// both resolve to the same id, `productId` first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductRef {
    Id(String),
    Input(String),
    Missing,
}

impl ProductRef {
    pub fn from_call(call: &ToolCall) -> Self {
        if let Some(id) = call.str_arg("productId") {
            Self::Id(id.to_string())
        } else if let Some(input) = call.str_arg("input") {
            Self::Input(input.to_string())
        } else {
            Self::Missing
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) | Self::Input(id) => Some(id),
            Self::Missing => None,
        }
    }
}

/// Tool for adding a product to the cart
pub struct AddToCartTool {
    backend: Arc<dyn ShopBackend>,
}

impl AddToCartTool {
    pub const NAME: &'static str = "addProductToCart";

    pub fn new(backend: Arc<dyn ShopBackend>) -> Self {
        Self { backend }
    }

    /// `qty` as a number or numeric string, default 1
    fn qty(call: &ToolCall) -> Option<i64> {
        match call.arguments.get("qty") {
            None | Some(serde_json::Value::Null) => Some(1),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            Some(v) => v.as_i64().or_else(|| {
                v.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            }),
        }
    }
}

#[async_trait]
impl Tool for AddToCartTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Add a product to the shopping cart. Accepts either productId or input (string).".into(),
            parameters: vec![
                ParameterSchema::optional("productId", "string", "The id of the product to add to cart"),
                ParameterSchema::optional("qty", "integer", "Quantity of product")
                    .with_default(serde_json::json!(1)),
                ParameterSchema::optional(
                    "input",
                    "string",
                    "Optional string input (used if only a product id is sent)",
                ),
            ],
            category: Some("cart".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &RunContext) -> CoreResult<ToolResult> {
        let product = ProductRef::from_call(call);
        let Some(product_id) = product.id() else {
            return Ok(ToolResult::failure(Self::NAME, "Product ID is required"));
        };

        let Some(qty) = Self::qty(call)
            .filter(|q| *q >= 1)
            .and_then(|q| u32::try_from(q).ok())
        else {
            return Ok(ToolResult::failure(
                Self::NAME,
                "Quantity must be a whole number of at least 1",
            ));
        };

        match self.backend.add_to_cart(product_id, qty, ctx.token()).await {
            Ok(data) => {
                info!(product_id, qty, "added to cart");
                let message = format!("Added product {product_id} (qty: {qty}) to cart");
                Ok(ToolResult::success(Self::NAME, message.clone()).with_data(
                    serde_json::json!({
                        "success": true,
                        "message": message,
                        "data": data,
                    }),
                ))
            }
            Err(e) => {
                warn!(product_id, error = %e, "add to cart failed");
                Ok(super::failure(Self::NAME, &e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockShopBackend;

    fn tool() -> (Arc<MockShopBackend>, AddToCartTool) {
        let backend = Arc::new(MockShopBackend::new());
        (backend.clone(), AddToCartTool::new(backend))
    }

    fn payload(result: &ToolResult) -> serde_json::Value {
        serde_json::from_str(&result.content()).unwrap()
    }

    #[test]
    fn test_product_ref_prefers_product_id() {
        let call = ToolCall::new("c1", AddToCartTool::NAME)
            .with_arg("productId", "a")
            .with_arg("input", "b");
        assert_eq!(ProductRef::from_call(&call), ProductRef::Id("a".into()));

        let call = ToolCall::new("c1", AddToCartTool::NAME).with_arg("input", " b ");
        assert_eq!(ProductRef::from_call(&call).id(), Some("b"));
    }

    #[tokio::test]
    async fn test_id_resolved_from_input() {
        let (backend, tool) = tool();
        let call = ToolCall::new("c1", AddToCartTool::NAME).with_arg("input", "p-mouse");

        let result = tool.execute(&call, &RunContext::with_token("tok")).await.unwrap();

        assert!(result.success);
        assert_eq!(payload(&result)["message"], "Added product p-mouse (qty: 1) to cart");
        let adds = backend.cart_adds().await;
        assert_eq!(adds[0].product_id, "p-mouse");
        assert_eq!(adds[0].qty, 1);
    }

    #[tokio::test]
    async fn test_missing_id_is_structured_failure() {
        let (backend, tool) = tool();
        let call = ToolCall::new("c1", AddToCartTool::NAME).with_arg("qty", 2);

        let result = tool.execute(&call, &RunContext::with_token("tok")).await.unwrap();

        assert!(!result.success);
        assert_eq!(
            payload(&result),
            serde_json::json!({"success": false, "error": "Product ID is required"})
        );
        assert!(backend.cart_adds().await.is_empty());
    }

    #[tokio::test]
    async fn test_qty_accepts_numeric_string_and_rejects_zero() {
        let (backend, tool) = tool();
        let ctx = RunContext::with_token("tok");

        let call = ToolCall::new("c1", AddToCartTool::NAME)
            .with_arg("productId", "p-charger-20")
            .with_arg("qty", "3");
        assert!(tool.execute(&call, &ctx).await.unwrap().success);
        assert_eq!(backend.cart_qty("p-charger-20").await, 3);

        let call = ToolCall::new("c2", AddToCartTool::NAME)
            .with_arg("productId", "p-charger-20")
            .with_arg("qty", 0);
        assert!(!tool.execute(&call, &ctx).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_backend_error_body_is_reported() {
        let (_, tool) = tool();
        let call = ToolCall::new("c1", AddToCartTool::NAME).with_arg("productId", "nope");

        let result = tool.execute(&call, &RunContext::with_token("tok")).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.error(), Some("Product not found"));
        assert_eq!(payload(&result)["error"]["message"], "Product not found");
    }
}
