//! # agent-runtime
//!
//! LLM providers for the shop assistant agent.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference via Ollama, tool calls parsed from
//!   fenced blocks in the model's text
//! - **OpenAI-compatible**: any `/chat/completions` endpoint with native
//!   function calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::provider_from_env;
//!
//! let provider = provider_from_env()?;
//! let agent = AgentBuilder::new().provider(provider).build()?;
//! ```

use std::sync::Arc;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;

#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, RunContext, Tool, ToolRegistry,
    Transcript,
};

/// Select a provider from `LLM_PROVIDER` (`ollama` or `openai`)
pub fn provider_from_env() -> Result<Arc<dyn LlmProvider>> {
    let kind = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".into());

    match kind.to_lowercase().as_str() {
        #[cfg(feature = "ollama")]
        "ollama" => Ok(Arc::new(OllamaProvider::from_env())),
        #[cfg(feature = "openai")]
        "openai" => Ok(Arc::new(OpenAiProvider::from_env()?)),
        other => Err(AgentError::Config(format!(
            "Unsupported LLM_PROVIDER '{other}'"
        ))),
    }
}
