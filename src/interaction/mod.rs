//! Interaction recording.
//!
//! A like, pass or superlike changes what the acting user should be shown
//! next, so recording one always invalidates that user's cached match list
//! before the decision is persisted.

use std::sync::Arc;

use tracing::{debug, info};

use crate::matching::cache::MatchCache;
use crate::matching::{MatchError, MatchResult};
use crate::models::{InteractionAction, InteractionRecord};
use crate::storage::InteractionStore;

/// Records swipe decisions and answers mutual-match queries.
pub struct InteractionRecorder<I: InteractionStore> {
    store: Arc<I>,
    cache: Arc<MatchCache>,
}

impl<I: InteractionStore> InteractionRecorder<I> {
    pub fn new(store: Arc<I>, cache: Arc<MatchCache>) -> Self {
        Self { store, cache }
    }

    /// Record a decision of `user_id` about `target_user_id`.
    ///
    /// # Errors
    /// - `MatchError::InvalidArgument` if either id is blank or both are the same
    /// - `MatchError::StorageError` if the store rejects the record; the
    ///   cache entry is already gone at that point
    pub async fn record_interaction(
        &self,
        user_id: &str,
        target_user_id: &str,
        action: InteractionAction,
    ) -> MatchResult<InteractionRecord> {
        if user_id.trim().is_empty() || target_user_id.trim().is_empty() {
            return Err(MatchError::InvalidArgument(
                "user id and target user id are required".to_string(),
            ));
        }
        if user_id == target_user_id {
            return Err(MatchError::InvalidArgument(
                "cannot interact with yourself".to_string(),
            ));
        }

        let invalidated = self.cache.invalidate(user_id).await;
        debug!(user_id, invalidated, "cleared match cache for interaction");

        let record = InteractionRecord::new(user_id, target_user_id, action);
        self.store.save_interaction(&record).await?;

        info!(user_id, target_user_id, action = %action, "recorded interaction");
        Ok(record)
    }

    /// Whether both users' latest decisions about each other are positive.
    pub async fn check_mutual_match(&self, user_a: &str, user_b: &str) -> MatchResult<bool> {
        let forward = self.store.find_interaction(user_a, user_b).await?;
        let backward = self.store.find_interaction(user_b, user_a).await?;

        let positive = |record: &Option<InteractionRecord>| {
            record.as_ref().is_some_and(|r| r.action.is_positive())
        };
        Ok(positive(&forward) && positive(&backward))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::cache::RankedList;
    use crate::storage::memory::MemoryStore;
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use std::time::Duration;

    // Store that rejects every write
    struct FailingStore;

    #[async_trait]
    impl InteractionStore for FailingStore {
        async fn save_interaction(&self, _record: &InteractionRecord) -> StorageResult<()> {
            Err(StorageError::QueryError("Mock store failure".to_string()))
        }

        async fn find_interaction(
            &self,
            _user_id: &str,
            _target_user_id: &str,
        ) -> StorageResult<Option<InteractionRecord>> {
            Ok(None)
        }
    }

    fn cache() -> Arc<MatchCache> {
        Arc::new(MatchCache::new(Duration::from_secs(60)))
    }

    async fn warm(cache: &MatchCache, user_id: &str) {
        let generation = cache.generation(user_id).await;
        cache.insert(user_id, generation, Arc::new(RankedList::new(Vec::new()))).await;
    }

    #[tokio::test]
    async fn test_record_invalidates_cache() {
        let cache = cache();
        warm(&cache, "alice").await;
        warm(&cache, "bob").await;
        let recorder = InteractionRecorder::new(Arc::new(MemoryStore::new()), Arc::clone(&cache));

        let record = recorder
            .record_interaction("alice", "bob", InteractionAction::Like)
            .await
            .unwrap();

        assert_eq!(record.user_id, "alice");
        assert_eq!(record.action, InteractionAction::Like);
        assert!(cache.get("alice").await.is_none());
        // only the acting user's list is affected
        assert!(cache.get("bob").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_invalidated_even_when_store_fails() {
        let cache = cache();
        warm(&cache, "alice").await;
        let recorder = InteractionRecorder::new(Arc::new(FailingStore), Arc::clone(&cache));

        match recorder.record_interaction("alice", "bob", InteractionAction::Pass).await {
            Err(MatchError::StorageError(_)) => {}
            other => panic!("Expected StorageError, got {:?}", other),
        }
        assert!(cache.get("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_invalid_ids() {
        let recorder = InteractionRecorder::new(Arc::new(MemoryStore::new()), cache());

        for (user, target) in [("", "bob"), ("alice", "  "), ("alice", "alice")] {
            let result = recorder.record_interaction(user, target, InteractionAction::Like).await;
            assert!(matches!(result, Err(MatchError::InvalidArgument(_))));
        }
    }

    #[tokio::test]
    async fn test_mutual_match() {
        let recorder = InteractionRecorder::new(Arc::new(MemoryStore::new()), cache());

        recorder
            .record_interaction("alice", "bob", InteractionAction::Like)
            .await
            .unwrap();
        assert!(!recorder.check_mutual_match("alice", "bob").await.unwrap());

        recorder
            .record_interaction("bob", "alice", InteractionAction::Superlike)
            .await
            .unwrap();
        assert!(recorder.check_mutual_match("alice", "bob").await.unwrap());
        assert!(recorder.check_mutual_match("bob", "alice").await.unwrap());

        // a later pass supersedes the like
        recorder
            .record_interaction("alice", "bob", InteractionAction::Pass)
            .await
            .unwrap();
        assert!(!recorder.check_mutual_match("alice", "bob").await.unwrap());
    }
}
