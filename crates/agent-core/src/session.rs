//! Session Management
//!
//! Optional multi-turn memory for transports. The orchestrator itself only
//! ever sees one transcript per run; a transport that wants continuity keys
//! transcripts by conversation id here.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::Transcript;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation kept across transport messages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Transcript carried into the next run
    pub transcript: Transcript,

    /// Owner of the conversation; a session is never served to anyone else
    pub owner: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, owner: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            transcript: Transcript::new(),
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_owned_by(&self, owner: Option<&str>) -> bool {
        self.owner.as_deref() == owner
    }

    pub fn message_count(&self) -> usize {
        self.transcript.len()
    }
}

/// Session store trait for persistence
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<()>;

    fn load(&self, id: &SessionId) -> Result<Option<Session>>;

    fn delete(&self, id: &SessionId) -> Result<()>;

    /// Sessions for an owner, most recently active first
    fn list(&self, owner: Option<&str>, limit: usize) -> Result<Vec<Session>>;
}

/// Default number of conversations kept by [`MemorySessionStore`]
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// In-memory session store (for development/testing).
///
/// Bounded: saving a new conversation into a full store evicts the one
/// that has been idle longest.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    max_sessions: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Number of stored conversations
    pub fn len(&self) -> usize {
        self.sessions.read().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::Session("session store lock poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;

        while !sessions.contains_key(&session.id) && sessions.len() >= self.max_sessions {
            let Some(idle) = sessions
                .values()
                .min_by_key(|s| s.updated_at)
                .map(|s| s.id.clone())
            else {
                break;
            };
            debug!(session = %idle, "evicting idle session");
            sessions.remove(&idle);
        }

        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<Session>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id);
        Ok(())
    }

    fn list(&self, owner: Option<&str>, limit: usize) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut result: Vec<_> = sessions
            .values()
            .filter(|s| owner.is_none_or(|o| s.owner.as_deref() == Some(o)))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);

        Ok(result)
    }
}
