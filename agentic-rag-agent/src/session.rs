//! Conversation sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::generator::Turn;

/// Identity of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for sessions and their turn history.
///
/// Concurrent messages in one session are not serialized against each other;
/// each append is atomic on its own.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a session with a fresh id.
    async fn create(&self, app_name: &str, user_id: &str) -> Result<Session>;

    /// Look a session up. Returns `None` if it does not exist or belongs to
    /// another app or user.
    async fn get(&self, app_name: &str, user_id: &str, session_id: &str)
    -> Result<Option<Session>>;

    /// The most recent `limit` turns, oldest first.
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>>;

    /// Append turns to a session.
    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<()>;
}

#[derive(Debug)]
struct SessionState {
    session: Session,
    turns: RwLock<Vec<Turn>>,
    last_active: Mutex<Instant>,
}

impl SessionState {
    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }
}

/// Process-local [`SessionService`].
///
/// Without an idle TTL every session is kept for the life of the process,
/// so memory grows with the number of conversations. With
/// [`with_idle_ttl`](Self::with_idle_ttl), [`evict_idle`](Self::evict_idle)
/// drops sessions that have not been read or written for longer than the TTL.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionService {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionState>>>>,
    idle_ttl: Option<Duration>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sessions idle for longer than `ttl` eligible for eviction.
    /// A zero `ttl` keeps sessions forever.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl).filter(|t| !t.is_zero());
        self
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    /// Drop sessions idle past the TTL and return how many were removed.
    /// Sessions in use are kept.
    pub async fn evict_idle(&self) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, state| match state.last_active.try_lock() {
            Ok(at) => now.duration_since(*at) <= ttl,
            Err(_) => true,
        });
        before - sessions.len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` until aborted.
    pub fn spawn_evictor(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = service.evict_idle().await;
                if removed > 0 {
                    debug!(removed, "evicted idle sessions");
                }
            }
        })
    }

    /// Number of sessions currently held.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn state(&self, session_id: &str) -> Result<Arc<SessionState>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create(&self, app_name: &str, user_id: &str) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        let state = Arc::new(SessionState {
            session: session.clone(),
            turns: RwLock::default(),
            last_active: Mutex::new(Instant::now()),
        });
        self.sessions.write().await.insert(session.id.clone(), state);
        Ok(session)
    }

    async fn get(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>> {
        let state = self.sessions.read().await.get(session_id).cloned();
        let Some(state) = state.filter(|state| {
            state.session.app_name == app_name && state.session.user_id == user_id
        }) else {
            return Ok(None);
        };
        state.touch().await;
        Ok(Some(state.session.clone()))
    }

    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let state = self.state(session_id).await?;
        state.touch().await;
        let turns = state.turns.read().await;
        let skip = turns.len().saturating_sub(limit);
        Ok(turns[skip..].to_vec())
    }

    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<()> {
        let state = self.state(session_id).await?;
        state.touch().await;
        state.turns.write().await.extend(turns);
        Ok(())
    }
}
