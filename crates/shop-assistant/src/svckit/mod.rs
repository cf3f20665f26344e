//! Service Kit - Agent Tools
//!
//! Shop tools that implement `agent_core::Tool`. Each performs exactly one
//! call against the shop backend and reports downstream failures as a
//! `{"success": false, "error": ...}` payload instead of an error.

mod add_to_cart;
mod search_product;

pub use add_to_cart::{AddToCartTool, ProductRef};
pub use search_product::SearchProductTool;

use agent_core::ToolResult;

use crate::error::ShopError;

/// Failure payload for a downstream shop error
pub(crate) fn failure(tool: &str, err: &ShopError) -> ToolResult {
    ToolResult::failure(tool, err.reason()).with_data(serde_json::json!({
        "success": false,
        "error": err.error_value(),
    }))
}
