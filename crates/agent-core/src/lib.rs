//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction, a tool registry
//! and the orchestration state machine that ties them together.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Agent (orchestrator)                    │
//! │  ┌───────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │ FastPath  │  │   Planner    │──│  LlmProvider          │  │
//! │  │ (domain)  │  │      ⇅       │  │  (Strategy)           │  │
//! │  └───────────┘  │ ToolExecutor │──│  ToolRegistry         │  │
//! │                 └──────────────┘  └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Ollama, OpenAI-compatible
//! gateways, or a scripted provider in tests without changing agent logic.

pub mod context;
pub mod error;
pub mod executor;
pub mod message;
pub mod mock;
pub mod orchestrator;
pub mod planner;
pub mod provider;
pub mod session;
pub mod tool;

pub use context::RunContext;
pub use error::{AgentError, Result};
pub use executor::{ToolExecutor, UnknownToolPolicy};
pub use message::{Message, Role, Transcript};
pub use orchestrator::{Agent, AgentBuilder, AgentConfig, AgentState, FastPath, RunReport};
pub use planner::{ConversationalPlanner, PlanOutcome};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use session::{DEFAULT_MAX_SESSIONS, MemorySessionStore, Session, SessionId, SessionStore};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
