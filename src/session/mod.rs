//! Holds per-session identity, preferences, and result cache; supplies
//! injected context. A map of session id to `Session`, each behind its own
//! `tokio::sync::Mutex` so one session's writes never block another's.

use crate::model::{Identity, InjectedContext, SessionPreferences, ToolResponse};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

struct SessionInner {
    last_activity: DateTime<Utc>,
    results: HashMap<String, ToolResponse>,
}

/// A single kernel session. Fully isolated from every other session: the
/// result cache lives behind this session's own mutex, never a shared one.
pub struct Session {
    pub id: Uuid,
    pub identity: Identity,
    pub preferences: SessionPreferences,
    pub created_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

impl Session {
    fn new(identity: Identity, preferences: SessionPreferences) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity,
            preferences,
            created_at: now,
            inner: Mutex::new(SessionInner { last_activity: now, results: HashMap::new() }),
        }
    }

    pub async fn last_activity(&self) -> DateTime<Utc> {
        self.inner.lock().await.last_activity
    }

    /// Stores a result under `key`, overwriting any prior entry, and
    /// refreshes `last_activity`.
    pub async fn store_result(&self, key: impl Into<String>, response: ToolResponse) {
        let mut inner = self.inner.lock().await;
        inner.results.insert(key.into(), response);
        inner.last_activity = Utc::now();
    }

    /// Reads a cached result by key, refreshing `last_activity`.
    pub async fn get_result(&self, key: &str) -> Option<ToolResponse> {
        let mut inner = self.inner.lock().await;
        inner.last_activity = Utc::now();
        inner.results.get(key).cloned()
    }

    /// Computes the injected context for this session, refreshing
    /// `last_activity` (§4.6: "updated on every... context injection").
    pub async fn context(&self) -> InjectedContext {
        let mut inner = self.inner.lock().await;
        inner.last_activity = Utc::now();
        let mut keys: Vec<String> = inner.results.keys().cloned().collect();
        keys.sort();
        InjectedContext {
            user_id: self.identity.user_id,
            role: self.identity.role,
            session_id: self.id,
            timestamp: Utc::now(),
            timezone: chrono::Local::now().offset().to_string(),
            default_basin: self.preferences.default_basin.clone(),
            risk_tolerance: self.preferences.risk_tolerance,
            available_results: keys,
        }
    }
}

/// Owns every session exclusively; no other component may construct or
/// mutate a `Session` directly.
pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }

    pub async fn create(&self, identity: Option<Identity>, preferences: Option<SessionPreferences>) -> Arc<Session> {
        let session = Arc::new(Session::new(identity.unwrap_or_else(Identity::demo_analyst), preferences.unwrap_or_default()));
        self.sessions.lock().await.insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn destroy(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    pub async fn list(&self) -> Vec<Uuid> {
        self.sessions.lock().await.keys().copied().collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
