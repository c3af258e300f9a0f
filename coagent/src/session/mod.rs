//! Coagent session store.
//!
//! In-memory map of sessions keyed by id, with a secondary anchor index
//! enforcing at most one active session per `(user_id, doctype, doc_name)`.
//! Idle sessions are evicted by a periodic sweep; the sweep returns the
//! evicted ids so callers can garbage-collect dependent state (pending
//! approval resolvers, per-session ERP adapters).

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::message::Message;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Idle,
    Terminated,
}

/// Parameters for creating (or anchoring) a session.
#[derive(Debug, Clone, Default)]
pub struct SessionParams {
    pub user_id: String,
    pub doctype: Option<String>,
    pub doc_name: Option<String>,
    pub enabled_industries: HashSet<String>,
}

/// One conversation anchored to an ERP document context.
pub struct CoagentSession {
    pub session_id: String,
    pub user_id: String,
    pub doctype: Option<String>,
    pub doc_name: Option<String>,
    pub enabled_industries: HashSet<String>,
    context: RwLock<HashMap<String, Value>>,
    conversation: Mutex<Vec<Message>>,
    pub created_at: Instant,
    last_activity: RwLock<Instant>,
    state: RwLock<SessionState>,
}

impl CoagentSession {
    fn new(params: SessionParams) -> Self {
        let now = Instant::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: params.user_id,
            doctype: params.doctype,
            doc_name: params.doc_name,
            enabled_industries: params.enabled_industries,
            context: RwLock::new(HashMap::new()),
            conversation: Mutex::new(Vec::new()),
            created_at: now,
            last_activity: RwLock::new(now),
            state: RwLock::new(SessionState::Active),
        }
    }

    /// Refreshes `last_activity`; called on every access.
    pub async fn touch(&self) {
        *self.last_activity.write().await = Instant::now();
        let mut state = self.state.write().await;
        if *state == SessionState::Idle {
            *state = SessionState::Active;
        }
    }

    pub async fn is_idle_for(&self, timeout: Duration) -> bool {
        self.last_activity.read().await.elapsed() > timeout
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn terminate(&self) {
        *self.state.write().await = SessionState::Terminated;
    }

    /// Sets one context key, last-writer-wins.
    pub async fn set_context(&self, key: impl Into<String>, value: Value) {
        self.context.write().await.insert(key.into(), value);
    }

    pub async fn get_context(&self, key: &str) -> Option<Value> {
        self.context.read().await.get(key).cloned()
    }

    /// Appends messages to the conversation history.
    pub async fn push_messages(&self, messages: impl IntoIterator<Item = Message>) {
        self.conversation.lock().await.extend(messages);
    }

    pub async fn conversation(&self) -> Vec<Message> {
        self.conversation.lock().await.clone()
    }

    fn anchor(user_id: &str, doctype: Option<&str>, doc_name: Option<&str>) -> String {
        format!(
            "{}|{}|{}",
            user_id,
            doctype.unwrap_or(""),
            doc_name.unwrap_or("")
        )
    }
}

/// Session statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub by_user: HashMap<String, usize>,
}

/// In-memory session store with idle expiry.
pub struct SessionStore {
    sessions: DashMap<String, Arc<CoagentSession>>,
    by_anchor: DashMap<String, String>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            by_anchor: DashMap::new(),
            idle_timeout,
        }
    }

    /// Returns the session for `session_id` (refreshing activity), the
    /// session anchored to the same `(user, doctype, doc_name)` triple, or a
    /// freshly created one.
    pub async fn get_or_create(
        &self,
        session_id: Option<&str>,
        params: SessionParams,
    ) -> Arc<CoagentSession> {
        if let Some(id) = session_id {
            if let Some(existing) = self.sessions.get(id).map(|r| r.clone()) {
                existing.touch().await;
                return existing;
            }
        }
        let anchor = CoagentSession::anchor(
            &params.user_id,
            params.doctype.as_deref(),
            params.doc_name.as_deref(),
        );
        if let Some(id) = self.by_anchor.get(&anchor).map(|r| r.clone()) {
            if let Some(existing) = self.sessions.get(&id).map(|r| r.clone()) {
                existing.touch().await;
                return existing;
            }
        }
        let session = Arc::new(CoagentSession::new(params));
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        self.by_anchor.insert(anchor, session.session_id.clone());
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<CoagentSession>> {
        self.sessions.get(session_id).map(|r| r.clone())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    fn remove(&self, session_id: &str) -> Option<Arc<CoagentSession>> {
        let (_, session) = self.sessions.remove(session_id)?;
        let anchor = CoagentSession::anchor(
            &session.user_id,
            session.doctype.as_deref(),
            session.doc_name.as_deref(),
        );
        self.by_anchor.remove_if(&anchor, |_, id| id == session_id);
        Some(session)
    }

    /// One sweep pass: evicts terminated sessions and sessions idle beyond
    /// the timeout. Returns the evicted ids.
    pub async fn sweep(&self) -> Vec<String> {
        let mut evict = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value();
            let gone = session.state().await == SessionState::Terminated
                || session.is_idle_for(self.idle_timeout).await;
            if gone {
                evict.push(entry.key().clone());
            } else if session.is_idle_for(self.idle_timeout / 2).await {
                *session.state.write().await = SessionState::Idle;
            }
        }
        for id in &evict {
            if self.remove(id).is_some() {
                tracing::info!(session_id = %id, "evicted idle session");
            }
        }
        evict
    }

    pub async fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            total: 0,
            active: 0,
            idle: 0,
            by_user: HashMap::new(),
        };
        for entry in self.sessions.iter() {
            let session = entry.value();
            stats.total += 1;
            match session.state().await {
                SessionState::Active => stats.active += 1,
                SessionState::Idle => stats.idle += 1,
                SessionState::Terminated => {}
            }
            *stats.by_user.entry(session.user_id.clone()).or_insert(0) += 1;
        }
        stats
    }
}
