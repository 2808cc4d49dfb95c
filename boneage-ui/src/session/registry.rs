//! Live sessions keyed by session ID

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::SessionHandle;

/// Registry of active sessions
///
/// Sessions are independent of each other; the registry lock only guards
/// membership, each session has its own lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session
    pub async fn create(&self) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(Uuid::new_v4()));
        self.sessions
            .write()
            .await
            .insert(handle.id(), handle.clone());
        handle
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.read().await.get(&id).cloned()?;
        handle.touch();
        Some(handle)
    }

    /// End a session; returns false when it did not exist
    pub async fn end(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(handle) => {
                handle.end("closed").await;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// End sessions idle for longer than `max_idle`; returns how many
    ///
    /// A session with an attached event stream belongs to an open page and
    /// is never idle.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<Arc<SessionHandle>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .values()
                .filter(|handle| !handle.has_subscribers() && handle.idle_for() > max_idle)
                .map(|handle| handle.id())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for handle in &expired {
            handle.end("idle timeout").await;
        }

        if !expired.is_empty() {
            info!(evicted = expired.len(), "Evicted idle sessions");
        }
        expired.len()
    }

    /// Periodically evict idle sessions in the background
    pub fn spawn_idle_sweeper(self: Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let period = (max_idle / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = self.evict_idle(max_idle).await;
                debug!(evicted, "Idle session sweep");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = SessionRegistry::new();
        let handle = registry.create().await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(handle.id()).await.unwrap().id(), handle.id());
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_end_removes_session() {
        let registry = SessionRegistry::new();
        let handle = registry.create().await;

        assert!(registry.end(handle.id()).await);
        assert!(!registry.end(handle.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_idle_only_removes_stale_sessions() {
        let registry = SessionRegistry::new();
        let stale = registry.create().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fresh = registry.create().await;

        let evicted = registry.evict_idle(Duration::from_millis(30)).await;

        assert_eq!(evicted, 1);
        assert!(registry.get(stale.id()).await.is_none());
        assert!(registry.get(fresh.id()).await.is_some());
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_sessions_with_event_subscribers() {
        let registry = SessionRegistry::new();
        let handle = registry.create().await;
        let events = handle.subscribe();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(registry.evict_idle(Duration::from_millis(30)).await, 0);
        assert_eq!(registry.len().await, 1);

        // Page closed its stream
        drop(events);
        assert_eq!(registry.evict_idle(Duration::from_millis(30)).await, 1);
        assert!(registry.is_empty().await);
    }
}
