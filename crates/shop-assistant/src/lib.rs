//! # shop-assistant
//!
//! Conversational shopping assistant: catalog search and add-to-cart tools
//! over the store's HTTP API, plus a model-free fast path for
//! "find X and add it to cart" requests.
//!
//! ## Flow
//!
//! ```text
//! user message
//!     │
//!     ├─ find … add to cart ──▶ FindAndAddFastPath ──▶ searchProduct ─▶ addProductToCart
//!     │
//!     └─ anything else ───────▶ planner ⇄ tools (searchProduct, addProductToCart)
//! ```

pub mod backend;
pub mod error;
pub mod fast_path;
pub mod intent;
pub mod model;
pub mod svckit;

use std::sync::Arc;
use std::time::Duration;

use agent_core::{Agent, AgentConfig, LlmProvider, ToolRegistry};

pub use backend::{HttpShopBackend, MockShopBackend, ShopApiConfig, ShopBackend};
pub use error::{Result, ShopError};
pub use fast_path::FindAndAddFastPath;
pub use model::{Price, Product, ProductQuery};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{AddToCartTool, ProductRef, SearchProductTool};
}

/// System prompt for the shopping assistant
pub const SHOP_ASSISTANT_PROMPT: &str = r"You are a friendly shopping assistant for an online store.

## What you can do

- `searchProduct` - search the catalog. Always search before talking about specific products.
- `addProductToCart` - add a product to the user's cart using the product id from a search result.

## Rules

1. Never invent products, prices or ids. Only use what `searchProduct` returned.
2. When the user wants something added, search first, pick the best match and add it with `addProductToCart`.
3. If several products match and the choice is unclear, list them briefly and ask which one.
4. If a tool reports an error, explain it plainly and suggest what the user can do next.
5. Keep replies short. Use **bold** for product names.";

/// Registry holding the two shop tools
pub fn shop_tools(backend: Arc<dyn ShopBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tools::SearchProductTool::new(backend.clone()));
    registry.register(tools::AddToCartTool::new(backend));
    registry
}

/// Fully wired shopping agent
pub fn shop_agent(
    provider: Arc<dyn LlmProvider>,
    backend: Arc<dyn ShopBackend>,
    config: AgentConfig,
) -> Agent {
    let fast_path = Arc::new(FindAndAddFastPath::new(backend.clone(), config.tool_timeout));
    Agent::new(provider, Arc::new(shop_tools(backend)), Some(fast_path), config)
}

/// Agent settings from the environment.
///
/// `LLM_MODEL`, `AGENT_MAX_TURNS`, `AGENT_TEMPERATURE`, `LLM_TIMEOUT_SECS`;
/// the system prompt is always [`SHOP_ASSISTANT_PROMPT`].
pub fn agent_config_from_env() -> AgentConfig {
    let mut config = AgentConfig {
        system_prompt: SHOP_ASSISTANT_PROMPT.into(),
        ..AgentConfig::default()
    };
    config.generation.temperature = 0.5;

    if let Ok(model) = std::env::var("LLM_MODEL") {
        config.generation.model = model;
    }
    if let Some(turns) = env_parse::<usize>("AGENT_MAX_TURNS").filter(|t| *t > 0) {
        config.max_turns = turns;
    }
    if let Some(temperature) = env_parse::<f32>("AGENT_TEMPERATURE") {
        config.generation.temperature = temperature;
    }
    if let Some(secs) = env_parse::<u64>("LLM_TIMEOUT_SECS") {
        config.model_timeout = Duration::from_secs(secs);
    }
    config
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_exposes_both_tools() {
        let registry = shop_tools(Arc::new(MockShopBackend::new()));
        assert_eq!(registry.names(), vec!["addProductToCart", "searchProduct"]);
        assert!(registry.generate_prompt_section().contains("productId"));
    }

    #[test]
    fn test_default_agent_config() {
        let config = agent_config_from_env();
        assert_eq!(config.system_prompt, SHOP_ASSISTANT_PROMPT);
        assert!(config.max_turns > 0);
    }
}
