//! Thread/session manager
//!
//! Maps logical conversation identifiers ("main", per-user ids, ...) to
//! persistent assistant threads. Sessions are created on first use and live
//! for the process lifetime.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::agents::error::AgentResult;
use crate::agents::transport::AssistantTransport;

/// Session identifier used when the caller does not name one
pub const DEFAULT_SESSION: &str = "main";

/// A conversation context bound to one assistant thread
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub thread_id: String,
    pub knowledge_store_id: Option<String>,
    pub created_at: DateTime<Utc>,
    turn_lock: Arc<Mutex<()>>,
}

impl Session {
    fn new(id: String, thread_id: String, knowledge_store_id: Option<String>) -> Self {
        Self {
            id,
            thread_id,
            knowledge_store_id,
            created_at: Utc::now(),
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wait for exclusive use of the session's thread.
    ///
    /// The transport does not support overlapping runs on one thread, so every
    /// turn holds this guard from posting its message until it returns.
    pub async fn lock_turn(&self) -> OwnedMutexGuard<()> {
        self.turn_lock.clone().lock_owned().await
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
            knowledge_store_id: self.knowledge_store_id.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub thread_id: String,
    pub knowledge_store_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Owner of the session id -> thread mapping
pub struct SessionManager {
    transport: Arc<dyn AssistantTransport>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn AssistantTransport>) -> Self {
        Self {
            transport,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a session, creating its thread on first use.
    ///
    /// - unseen id: a new thread is created with the knowledge store bound
    /// - seen id with a different store: the thread is rebound (last bind wins)
    /// - seen id without a store, or with the same store: returned unchanged
    ///
    /// Transport calls run without the session map locked, so resolving one
    /// session never waits on another session's thread creation.
    pub async fn resolve(
        &self,
        session_id: &str,
        knowledge_store_id: Option<&str>,
    ) -> AgentResult<Session> {
        let existing = self.sessions.read().await.get(session_id).cloned();
        let session = match existing {
            Some(session) => session,
            None => self.create(session_id, knowledge_store_id).await?,
        };

        match knowledge_store_id {
            Some(store) if session.knowledge_store_id.as_deref() != Some(store) => {
                self.rebind(session, store).await
            }
            _ => Ok(session),
        }
    }

    async fn create(&self, session_id: &str, knowledge_store_id: Option<&str>) -> AgentResult<Session> {
        let thread_id = self.transport.create_thread(knowledge_store_id).await?;

        let mut sessions = self.sessions.write().await;
        match sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => {
                // Lost a creation race; the first thread stays the session's
                tracing::debug!(
                    session = session_id,
                    thread = %thread_id,
                    "Session created concurrently; discarding thread"
                );
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                tracing::info!(session = session_id, thread = %thread_id, "Created session");
                let session = Session::new(
                    session_id.to_string(),
                    thread_id,
                    knowledge_store_id.map(str::to_string),
                );
                Ok(entry.insert(session).clone())
            }
        }
    }

    async fn rebind(&self, session: Session, store: &str) -> AgentResult<Session> {
        self.transport.update_thread(&session.thread_id, store).await?;
        tracing::info!(
            session = %session.id,
            thread = %session.thread_id,
            "Rebound knowledge store {:?} -> {}",
            session.knowledge_store_id,
            store
        );

        let mut sessions = self.sessions.write().await;
        let stored = sessions.entry(session.id.clone()).or_insert(session);
        stored.knowledge_store_id = Some(store.to_string());
        Ok(stored.clone())
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Summaries of all sessions, oldest first
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(Session::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
