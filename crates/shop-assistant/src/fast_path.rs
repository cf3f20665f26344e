//! Find-and-add fast path
//!
//! "find X and add it to cart" is answered without the model: search for X,
//! add the first hit with qty 1, confirm.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use agent_core::{
    AgentError, FastPath, Message, Result as CoreResult, RunContext, Tool, ToolCall, ToolResult,
};

use crate::backend::ShopBackend;
use crate::intent;
use crate::model::Product;
use crate::svckit::{AddToCartTool, SearchProductTool};

/// Search-then-add shortcut over the shop tools
pub struct FindAndAddFastPath {
    search: SearchProductTool,
    add: AddToCartTool,
    tool_timeout: Duration,
}

impl FindAndAddFastPath {
    /// `tool_timeout` bounds each tool call unless the run sets its own
    pub fn new(backend: Arc<dyn ShopBackend>, tool_timeout: Duration) -> Self {
        Self {
            search: SearchProductTool::new(backend.clone()),
            add: AddToCartTool::new(backend),
            tool_timeout,
        }
    }

    /// Run one tool. Only cancellation is an error; timeouts and tool errors
    /// come back as failure results.
    async fn call(&self, tool: &dyn Tool, call: ToolCall, ctx: &RunContext) -> CoreResult<ToolResult> {
        let limit = ctx.timeout().unwrap_or(self.tool_timeout);

        let outcome = tokio::select! {
            biased;
            () = ctx.cancellation_token().cancelled() => return Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(limit, tool.execute(&call, ctx)) => outcome,
        };

        Ok(match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::failure(&call.name, e.to_string()),
            Err(_) => {
                warn!(
                    tool = %call.name,
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "fast-path tool timed out"
                );
                ToolResult::failure(&call.name, "the store took too long to respond")
            }
        })
    }
}

#[async_trait]
impl FastPath for FindAndAddFastPath {
    fn name(&self) -> &str {
        "find_and_add"
    }

    fn matches(&self, message: &Message) -> bool {
        intent::classify(message)
    }

    async fn run(&self, message: &Message, ctx: &RunContext) -> CoreResult<Message> {
        let query = intent::derive_query(message.text().unwrap_or_default());
        info!(%query, "find-and-add");

        let search = ToolCall::new("fast_search", SearchProductTool::NAME).with_arg("query", query.as_str());
        let found = self.call(&self.search, search, ctx).await?;
        if let Some(error) = found.error() {
            return Ok(Message::assistant(format!(
                "⚠️ I couldn't search the catalog for \"{query}\" right now: {error}"
            )));
        }

        let best = found
            .data
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .and_then(|products| products.first());
        let Some(best) = best else {
            return Ok(Message::assistant(format!(
                "I couldn't find any products matching \"{query}\". Could you be more specific?"
            )));
        };

        let Some(product_id) = Product::id_of(best) else {
            warn!(%query, "first search hit has no id");
            return Ok(Message::assistant(format!(
                "I couldn't find any products matching \"{query}\". Could you be more specific?"
            )));
        };
        let product_name = Product::name_of(best)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(product_id);

        let add = ToolCall::new("fast_add", AddToCartTool::NAME)
            .with_arg("productId", product_id)
            .with_arg("qty", 1);
        let added = self.call(&self.add, add, ctx).await?;

        Ok(Message::assistant(match added.error() {
            None => format!("✅ **{product_name}** has been successfully added to your cart."),
            Some(error) => format!(
                "⚠️ I found **{product_name}**, but there was an error adding it to the cart: {error}"
            ),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockShopBackend;
    use rust_decimal_macros::dec;

    const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

    fn fast_path() -> (Arc<MockShopBackend>, FindAndAddFastPath) {
        let backend = Arc::new(MockShopBackend::new());
        (backend.clone(), FindAndAddFastPath::new(backend, TOOL_TIMEOUT))
    }

    #[tokio::test]
    async fn test_zero_results_asks_for_clarification() {
        let (backend, fast_path) = fast_path();
        let msg = Message::user("find me a submarine and add it to cart");

        let reply = fast_path.run(&msg, &RunContext::with_token("tok")).await.unwrap();

        assert_eq!(
            reply.text(),
            Some("I couldn't find any products matching \"me a submarine\". Could you be more specific?")
        );
        assert!(backend.cart_adds().await.is_empty());
    }

    #[tokio::test]
    async fn test_adds_first_result_with_qty_one() {
        let (backend, fast_path) = fast_path();
        let msg = Message::user("Search for usb-c charger and add it to cart");

        let reply = fast_path.run(&msg, &RunContext::with_token("tok")).await.unwrap();

        assert_eq!(
            reply.text(),
            Some("✅ **USB-C Charger 65W** has been successfully added to your cart.")
        );
        let adds = backend.cart_adds().await;
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].product_id, "p-charger-65");
        assert_eq!(adds[0].qty, 1);
        assert_eq!(adds[0].token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_add_failure_names_product_and_reason() {
        let backend = Arc::new(MockShopBackend::with_catalog(vec![
            Product::new("p-sold-out", "Vintage Keyboard")
                .with_price(dec!(4000), "BDT")
                .with_stock(0),
        ]));
        let fast_path = FindAndAddFastPath::new(backend, TOOL_TIMEOUT);
        let msg = Message::user("find keyboard and add it");

        let reply = fast_path.run(&msg, &RunContext::with_token("tok")).await.unwrap();

        assert_eq!(
            reply.text(),
            Some("⚠️ I found **Vintage Keyboard**, but there was an error adding it to the cart: Out of stock: Vintage Keyboard")
        );
    }

    #[tokio::test]
    async fn test_search_outage_is_reported() {
        let (backend, fast_path) = fast_path();
        backend.set_search_down(true);
        let msg = Message::user("find mouse and add it");

        let reply = fast_path.run(&msg, &RunContext::new()).await.unwrap();

        assert!(reply.text().unwrap().contains("Service unavailable"));
        assert!(backend.cart_adds().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let (_, fast_path) = fast_path();
        let ctx = RunContext::with_token("tok");
        ctx.cancellation_token().cancel();

        let err = fast_path
            .run(&Message::user("find mouse and add it"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_slow_cart_still_names_product() {
        let backend = Arc::new(
            MockShopBackend::with_catalog(vec![Product::new("p-slow", "Slow Charger").with_stock(5)])
                .with_cart_delay(Duration::from_millis(200)),
        );
        let fast_path = FindAndAddFastPath::new(backend, TOOL_TIMEOUT);
        let ctx = RunContext::with_token("tok").call_timeout(Duration::from_millis(20));

        let reply = fast_path
            .run(&Message::user("find charger and add it to cart"), &ctx)
            .await
            .unwrap();

        assert_eq!(
            reply.text(),
            Some("⚠️ I found **Slow Charger**, but there was an error adding it to the cart: the store took too long to respond")
        );
    }

    #[tokio::test]
    async fn test_hit_without_id_asks_for_clarification() {
        let backend = Arc::new(MockShopBackend::with_catalog(vec![Product::new("", "Ghost Cable").with_stock(3)]));
        let fast_path = FindAndAddFastPath::new(backend.clone(), TOOL_TIMEOUT);

        let reply = fast_path
            .run(&Message::user("find cable and add it"), &RunContext::with_token("tok"))
            .await
            .unwrap();

        assert_eq!(
            reply.text(),
            Some("I couldn't find any products matching \"cable\". Could you be more specific?")
        );
        assert!(backend.cart_adds().await.is_empty());
    }
}
