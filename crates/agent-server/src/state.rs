//! Application State

use std::sync::Arc;

use agent_core::{Agent, SessionStore};
use shop_assistant::ShopBackend;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Fully wired shopping agent (provider, tools, fast path)
    pub agent: Arc<Agent>,

    /// Store backend, for health reporting
    pub backend: Arc<dyn ShopBackend>,

    /// Conversations addressed by `conversation_id`
    pub sessions: Arc<dyn SessionStore>,
}
