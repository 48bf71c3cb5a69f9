//! Session store: one in-flight conversation per user identity.
//!
//! Each session sits behind its own async mutex, so a user's events are
//! applied one at a time while other users' sessions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::state::{DialogueState, Stage};

/// Per-user conversation state.
#[derive(Debug)]
pub struct Session {
    pub user_id: String,
    pub state: DialogueState,
    pub last_active: DateTime<Utc>,
    closed: bool,
}

impl Session {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            state: DialogueState::default(),
            last_active: Utc::now(),
            closed: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    fn is_idle(&self, max_idle: Duration, now: DateTime<Utc>) -> bool {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.last_active) > max_idle
    }
}

/// In-memory session store keyed by user identity.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lock the user's session, creating it on first interaction.
    ///
    /// If the session is closed while we wait for it, a fresh one is created
    /// and locked instead.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<Session> {
        loop {
            let slot = {
                let mut sessions = self.sessions.write().await;
                Arc::clone(sessions.entry(user_id.to_string()).or_insert_with(|| {
                    debug!(user_id, "Session created");
                    Arc::new(Mutex::new(Session::new(user_id)))
                }))
            };

            let guard = slot.lock_owned().await;
            if !guard.closed {
                return guard;
            }
        }
    }

    /// Close a locked session and remove it from the store.
    pub async fn close(&self, mut session: OwnedMutexGuard<Session>) {
        session.closed = true;
        let mut sessions = self.sessions.write().await;
        let is_current = sessions
            .get(&session.user_id)
            .is_some_and(|slot| Arc::ptr_eq(slot, OwnedMutexGuard::mutex(&session)));
        if is_current {
            sessions.remove(&session.user_id);
        }
        debug!(user_id = %session.user_id, "Session closed");
    }

    /// Current stage of a user's session, if one exists.
    pub async fn stage(&self, user_id: &str) -> Option<Stage> {
        let slot = self.sessions.read().await.get(user_id).cloned()?;
        let session = slot.lock().await;
        (!session.closed).then(|| session.state.stage())
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`. Sessions busy with an
    /// event are skipped. Returns the number removed.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| match slot.try_lock() {
            Ok(mut session) if session.is_idle(max_idle, now) => {
                session.closed = true;
                false
            }
            _ => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Pruned idle sessions");
        }
        removed
    }
}

/// Spawn a background task that prunes idle sessions every 60 seconds.
pub fn spawn_expiry_task(
    store: Arc<SessionStore>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            store.prune_idle(max_idle).await;
        }
    })
}
