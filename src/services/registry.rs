use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::config::{SessionConfig, MAX_SESSION_IDLE_TTL_SECS};
use crate::selection::session::PracticeSession;

pub type SharedSession = Arc<Mutex<PracticeSession>>;

/// Live practice sessions. Each session sits behind its own lock so answers
/// within one session are serialized while different sessions run in parallel.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SharedSession>>,
    idle_ttl: Duration,
    max_active: usize,
}

impl SessionRegistry {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl: Duration::seconds(config.idle_ttl_secs.min(MAX_SESSION_IDLE_TTL_SECS) as i64),
            max_active: config.max_active.max(1),
        }
    }

    /// Registers a session, evicting idle ones first. Returns the handle and
    /// the ids of evicted sessions.
    pub async fn insert(&self, session: PracticeSession) -> (SharedSession, Vec<String>) {
        let id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.lock().await;

        let mut evicted = self.evict_idle(&mut sessions);
        if sessions.len() >= self.max_active {
            let overflow = sessions.len() + 1 - self.max_active;
            evicted.extend(self.evict_oldest(&mut sessions, overflow));
        }
        sessions.insert(id, shared.clone());
        (shared, evicted)
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.lock().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sessions currently locked by a request are never evicted.
    fn evict_idle(&self, sessions: &mut HashMap<String, SharedSession>) -> Vec<String> {
        let cutoff = Utc::now() - self.idle_ttl;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, shared)| {
                shared
                    .try_lock()
                    .map(|session| session.last_active_at < cutoff)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Evicted idle practice sessions");
        }
        expired
    }

    fn evict_oldest(
        &self,
        sessions: &mut HashMap<String, SharedSession>,
        count: usize,
    ) -> Vec<String> {
        let mut idle: Vec<(chrono::DateTime<Utc>, String)> = sessions
            .iter()
            .filter_map(|(id, shared)| {
                shared
                    .try_lock()
                    .ok()
                    .map(|session| (session.last_active_at, id.clone()))
            })
            .collect();
        idle.sort();

        let victims: Vec<String> = idle.into_iter().take(count).map(|(_, id)| id).collect();
        for id in &victims {
            sessions.remove(id);
        }
        if !victims.is_empty() {
            tracing::warn!(
                count = victims.len(),
                max_active = self.max_active,
                "Session capacity reached, evicted least recently active sessions"
            );
        }
        victims
    }
}
