//! Per-conversation mutual exclusion over a `DashMap`-of-locks keyed by
//! conversation id. One lease per `ConversationId`, acquired before the
//! pipeline runs and released (via `Drop`) once it completes.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use flowline_core::ids::ConversationId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct LeaseRegistry {
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquires the lease for `conversation_id`, waiting up to `timeout`.
    /// Returns `None` on timeout — callers surface this as `Busy`.
    pub async fn acquire(
        &self,
        conversation_id: &ConversationId,
        timeout: Duration,
    ) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(conversation_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        tokio::time::timeout(timeout, lock.lock_owned()).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_for_first_to_drop() {
        let registry = LeaseRegistry::new();
        let conversation_id = ConversationId::new();

        let guard = registry
            .acquire(&conversation_id, Duration::from_millis(100))
            .await
            .expect("first acquire succeeds");

        let registry = Arc::new(registry);
        let registry2 = registry.clone();
        let conversation_id2 = conversation_id.clone();
        let handle = tokio::spawn(async move {
            registry2
                .acquire(&conversation_id2, Duration::from_millis(200))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        let second = handle.await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn acquire_times_out_while_held() {
        let registry = LeaseRegistry::new();
        let conversation_id = ConversationId::new();
        let _guard = registry
            .acquire(&conversation_id, Duration::from_millis(50))
            .await
            .unwrap();

        let second = registry
            .acquire(&conversation_id, Duration::from_millis(20))
            .await;
        assert!(second.is_none());
    }
}
