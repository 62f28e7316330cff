//! In-memory session store.
//!
//! Each session sits behind its own async mutex, held for a whole
//! exchange, so requests on one session run one at a time while
//! different sessions proceed in parallel.

use iiot_assistant_core::session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

pub type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Look up a session without creating it.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Look up a session, creating it with `create` on first use.
    ///
    /// When the store is full, the least recently updated idle session is
    /// evicted first. A session is idle only when no request holds its
    /// handle, so a request that has looked a session up but not locked it
    /// yet keeps it alive. If every session is busy the store briefly grows
    /// past its limit.
    pub async fn get_or_create(&self, id: &str, create: impl FnOnce() -> Session) -> SessionHandle {
        if let Some(handle) = self.get(id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        // Another request may have created it while we waited
        if let Some(handle) = sessions.get(id) {
            return handle.clone();
        }

        if sessions.len() >= self.max_sessions {
            match Self::eviction_candidate(&sessions) {
                Some(victim) => {
                    debug!(session_id = %victim, "Evicting least recently used session");
                    sessions.remove(&victim);
                }
                None => warn!(
                    sessions = sessions.len(),
                    "Session store full and every session is busy"
                ),
            }
        }

        let handle = Arc::new(Mutex::new(create()));
        sessions.insert(id.to_string(), handle.clone());
        debug!(session_id = id, total = sessions.len(), "Session created");
        handle
    }

    fn eviction_candidate(sessions: &HashMap<String, SessionHandle>) -> Option<String> {
        sessions
            .iter()
            .filter_map(|(id, handle)| {
                // Any other owner is a request using the session
                if Arc::strong_count(handle) > 1 {
                    return None;
                }
                let session = handle.try_lock().ok()?;
                Some((id.clone(), session.updated_at))
            })
            .min_by_key(|(_, updated_at)| *updated_at)
            .map(|(id, _)| id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiot_assistant_core::message::{ConversationTurn, Message};
    use iiot_assistant_core::session::SessionId;

    fn create(id: &str) -> impl FnOnce() -> Session + '_ {
        move || Session::new(SessionId::from(id), "sys")
    }

    #[tokio::test]
    async fn same_id_returns_same_session() {
        let store = SessionStore::new(10);
        let a = store.get_or_create("a", create("a")).await;
        let again = store.get_or_create("a", create("a")).await;
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(store.len().await, 1);
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn full_store_evicts_least_recently_updated() {
        let store = SessionStore::new(2);
        let a = store.get_or_create("a", create("a")).await;
        store.get_or_create("b", create("b")).await;

        // Touch "a" so "b" becomes the oldest
        a.lock().await.commit(
            vec![Message::user("q"), Message::assistant("r")],
            ConversationTurn::new("q", "r"),
        );
        drop(a);

        store.get_or_create("c", create("c")).await;
        assert_eq!(store.len().await, 2);
        assert!(store.get("a").await.is_some());
        assert!(store.get("b").await.is_none());
        assert!(store.get("c").await.is_some());
    }

    #[tokio::test]
    async fn busy_sessions_are_not_evicted() {
        let store = SessionStore::new(1);
        let a = store.get_or_create("a", create("a")).await;
        let _guard = a.lock().await;

        store.get_or_create("b", create("b")).await;
        assert_eq!(store.len().await, 2);
        assert!(store.get("a").await.is_some());
    }

    #[tokio::test]
    async fn looked_up_session_survives_eviction_before_locking() {
        let store = SessionStore::new(1);
        let s = store.get_or_create("s", create("s")).await;

        store.get_or_create("t", create("t")).await;
        let again = store.get_or_create("s", create("s")).await;

        assert!(Arc::ptr_eq(&s, &again));
    }

    #[tokio::test]
    async fn released_handles_make_sessions_evictable() {
        let store = SessionStore::new(1);
        drop(store.get_or_create("a", create("a")).await);

        store.get_or_create("b", create("b")).await;
        assert_eq!(store.len().await, 1);
        assert!(store.get("a").await.is_none());
    }
}
