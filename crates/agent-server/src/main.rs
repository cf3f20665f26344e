//! shop-agent HTTP Server
//!
//! Axum transport for the shopping assistant: REST and WebSocket chat
//! endpoints in front of the agent. Every request needs the caller's store
//! token, which the agent forwards to the shop API.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{DEFAULT_MAX_SESSIONS, MemorySessionStore};
use agent_runtime::provider_from_env;
use shop_assistant::{HttpShopBackend, MockShopBackend, ShopBackend, agent_config_from_env, shop_agent};

use crate::handlers::{chat_handler, chat_ws_handler, health_check, list_models};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize LLM provider
    let provider = provider_from_env()?;
    if let Ok(info) = provider.info().await {
        tracing::info!(
            provider = %info.name,
            native_tools = info.supports_tools,
            "LLM provider selected"
        );
    }
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ LLM provider reachable");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ LLM provider not available - planner turns will fail");
        }
    }

    // Shop backend
    let backend: Arc<dyn ShopBackend> = match std::env::var("SHOP_BACKEND").as_deref() {
        Ok("mock") => {
            tracing::warn!("⚠ Using the in-memory mock store");
            Arc::new(MockShopBackend::new())
        }
        _ => Arc::new(HttpShopBackend::from_env()?),
    };
    if !backend.health_check().await {
        tracing::warn!("⚠ Shop API ({}) not reachable", backend.name());
    }

    let config = agent_config_from_env();
    tracing::info!(
        model = %config.generation.model,
        max_turns = config.max_turns,
        "Agent configured"
    );

    let agent = shop_agent(provider, backend.clone(), config);
    for name in agent.tools().names() {
        tracing::info!("  • {}", name);
    }

    let max_sessions = std::env::var("MAX_SESSIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_SESSIONS);

    let state = AppState {
        agent: Arc::new(agent),
        backend,
        sessions: Arc::new(MemorySessionStore::with_capacity(max_sessions)),
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 shop-agent server running on http://{}", addr);
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  GET  /api/models   - List available models");
    tracing::info!("  POST /api/chat     - Send message");
    tracing::info!("  GET  /api/chat/ws  - WebSocket chat");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Build the router
fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/ws", get(chat_ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
