use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::runtime::SessionHandle;

struct Entry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Live navigation sessions by id.
///
/// Sessions nobody has touched for `idle_timeout` are ended and forgotten.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub async fn insert(&self, id: Uuid, handle: SessionHandle) {
        let entry = Entry {
            handle,
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
    }

    /// Handle for `id`, marking the session as used.
    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.handle.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|entry| entry.handle)
    }

    #[cfg(test)]
    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// End and drop every session idle for longer than the timeout.
    pub async fn evict_idle(&self) -> Vec<Uuid> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let idle: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_seen) > self.idle_timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &idle {
            if let Some(entry) = sessions.remove(id) {
                // A runtime that already stopped needs no End.
                let _ = entry.handle.end();
                tracing::info!("session {id} evicted after {:?} idle", self.idle_timeout);
            }
        }
        idle
    }
}

/// Evict idle sessions every `every`; runs until aborted.
pub fn spawn_idle_sweeper(registry: Arc<SessionRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            registry.evict_idle().await;
        }
    })
}
