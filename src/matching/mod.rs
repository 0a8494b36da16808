//! Match service.
//!
//! The user-facing query surface of the engine. It loads profiles from the
//! [`ProfileSource`], keeps the [`SimilarityIndex`] populated, scores the
//! candidate pool with the [`CompatibilityScorer`], and caches ranked lists
//! per user.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use campus_match::config::MatchConfig;
//! use campus_match::matching::{MatchQuery, MatchService};
//! use campus_match::storage::memory::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::from_json_file("profiles.json").await?);
//! let service = MatchService::new(store, MatchConfig::default())?;
//! service.sync_all_users().await?;
//!
//! let matches = service.find_matches("u1", &MatchQuery::new(Some(5), None)).await?;
//! for m in matches {
//!     println!("{} - {}", m.user.id, m.compatibility_score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, MatchConfig};
use crate::index::{IndexStats, SimilarityIndex, SimilarityQuery, TextSearchOptions};
use crate::models::{Profile, ProfileMetadata, ProfileSummary, ScoredMatch};
use crate::scoring::{CompatibilityReport, CompatibilityScorer};
use crate::storage::{ProfileSource, StorageError};

use self::cache::{CacheStats, MatchCache, RankedList};

/// Errors that can occur while serving match queries.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The referenced user has no resolvable profile
    #[error("User not found: {0}")]
    NotFound(String),

    /// Invalid request parameters
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The profile or interaction store failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The engine configuration was rejected
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

impl From<StorageError> for MatchError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => MatchError::NotFound(msg),
            other => MatchError::StorageError(other.to_string()),
        }
    }
}

/// Result type for match operations.
pub type MatchResult<T> = Result<T, MatchError>;

/// Parameters of a match list request.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    /// Maximum number of matches to return
    pub limit: usize,

    /// Matches scoring below this are dropped (scores top out at 100)
    pub min_score: u32,

    /// Users that must not appear in the result
    pub exclude_ids: Vec<String>,

    /// Bypass the cache and recompute
    pub refresh: bool,
}

impl Default for MatchQuery {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl MatchQuery {
    /// Create a new match query.
    ///
    /// # Arguments
    /// * `limit` - Maximum number of matches (default: 20)
    /// * `min_score` - Minimum compatibility score (default: 40)
    pub fn new(limit: Option<usize>, min_score: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(20),
            min_score: min_score.unwrap_or(40),
            exclude_ids: Vec::new(),
            refresh: false,
        }
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn refreshed(mut self) -> Self {
        self.refresh = true;
        self
    }

    fn validate(&self) -> MatchResult<()> {
        if self.limit == 0 {
            return Err(MatchError::InvalidArgument(
                "limit must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    fn excluded(&self) -> HashSet<&str> {
        self.exclude_ids.iter().map(String::as_str).collect()
    }

    /// Filter a ranked list by this query's threshold and exclusions, then truncate.
    fn page(&self, ranked: &[ScoredMatch]) -> Vec<ScoredMatch> {
        let excluded = self.excluded();
        ranked
            .iter()
            .filter(|m| u32::from(m.compatibility_score) >= self.min_score)
            .filter(|m| !excluded.contains(m.user.id.as_str()))
            .take(self.limit)
            .cloned()
            .collect()
    }

    /// The page this query would see from a cached list, or `None` when the
    /// list cannot answer it.
    ///
    /// A list is unusable when its pool kept out a user this query wants to
    /// see, or when this query's extra exclusions emptied rows out of a
    /// capped pool and left the page short.
    fn page_cached(&self, list: &RankedList) -> Option<Vec<ScoredMatch>> {
        let excluded = self.excluded();
        if !list.excluded.iter().all(|id| excluded.contains(id.as_str())) {
            return None;
        }

        let page = self.page(&list.matches);
        let dropped_rows = list
            .matches
            .iter()
            .any(|m| excluded.contains(m.user.id.as_str()));
        if list.pool_truncated && dropped_rows && page.len() < self.limit {
            return None;
        }
        Some(page)
    }
}

/// A free-text search result enriched with the user's profile summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSearchResult {
    pub user_id: String,
    pub score: f64,
    pub metadata: ProfileMetadata,

    /// `None` when the profile source no longer knows the user
    pub user: Option<ProfileSummary>,
}

/// What a single-profile sync did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SyncOutcome {
    /// The profile was (re)vectorized at the given corpus position
    Indexed { position: usize },

    /// The source no longer has the user; any index entry was dropped
    Removed { was_indexed: bool },
}

/// Orchestrates indexing, candidate retrieval, scoring and caching.
pub struct MatchService<S: ProfileSource> {
    source: Arc<S>,
    index: Arc<RwLock<SimilarityIndex>>,
    cache: Arc<MatchCache>,
    scorer: CompatibilityScorer,
    config: MatchConfig,
}

impl<S: ProfileSource> MatchService<S> {
    /// Create a service with an empty index and cache.
    ///
    /// # Errors
    /// Returns `MatchError::ConfigError` if the configuration is invalid
    pub fn new(source: Arc<S>, config: MatchConfig) -> MatchResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            index: Arc::new(RwLock::new(SimilarityIndex::new())),
            cache: Arc::new(MatchCache::new(config.cache_ttl())),
            scorer: CompatibilityScorer::new(config.weights),
            config,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Shared handle to the match cache.
    pub fn cache(&self) -> Arc<MatchCache> {
        Arc::clone(&self.cache)
    }

    /// Shared handle to the similarity index.
    pub fn index(&self) -> Arc<RwLock<SimilarityIndex>> {
        Arc::clone(&self.index)
    }

    pub async fn index_stats(&self) -> IndexStats {
        self.index.read().await.stats()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn load_profile(&self, user_id: &str) -> MatchResult<Profile> {
        self.source.get_profile(user_id).await.map_err(MatchError::from)
    }

    /// Add the user to the index unless already present.
    async fn ensure_indexed(&self, profile: &Profile) {
        if self.index.read().await.contains(&profile.id) {
            return;
        }
        let mut index = self.index.write().await;
        if !index.contains(&profile.id) {
            let position = index.add_user(&profile.id, profile);
            debug!(user_id = %profile.id, position, "indexed user on demand");
        }
    }

    /// Ranked matches for a user.
    ///
    /// Served from cache when a fresh entry can answer the query and
    /// `refresh` is not set. A cached list is reused for any smaller `limit`,
    /// higher `min_score` or larger exclusion set, and recomputed once the
    /// exclusions have used up a capped candidate pool. Lists whose
    /// computation overlapped an invalidation are returned but not cached.
    ///
    /// # Errors
    /// - `MatchError::InvalidArgument` if `limit` is zero
    /// - `MatchError::NotFound` if the profile source doesn't know the user
    pub async fn find_matches(&self, user_id: &str, query: &MatchQuery) -> MatchResult<Vec<ScoredMatch>> {
        query.validate()?;

        if !query.refresh {
            if let Some(cached) = self.cache.get(user_id).await {
                if let Some(page) = query.page_cached(&cached) {
                    debug!(user_id, cached = cached.matches.len(), "serving matches from cache");
                    return Ok(page);
                }
                debug!(user_id, "cached matches cannot answer query, recomputing");
            }
        }

        let generation = self.cache.generation(user_id).await;
        let ranked = Arc::new(self.compute_matches(user_id, &query.exclude_ids).await?);
        if !self.cache.insert(user_id, generation, Arc::clone(&ranked)).await {
            debug!(user_id, "matches invalidated during computation, not cached");
        }
        Ok(query.page(&ranked.matches))
    }

    /// Score the candidate pool of `user_id`, keeping `exclude_ids` out of it.
    async fn compute_matches(&self, user_id: &str, exclude_ids: &[String]) -> MatchResult<RankedList> {
        // 1. Load the requesting user and make sure they are indexed
        let profile = self.load_profile(user_id).await?;
        self.ensure_indexed(&profile).await;

        // 2. Candidate pool from the similarity index
        let excluded: HashSet<String> = exclude_ids.iter().cloned().collect();
        let pool_query = SimilarityQuery {
            limit: self.config.candidate_pool_size,
            min_similarity: self.config.candidate_min_similarity,
            exclude_ids: excluded.clone(),
        };
        let pool = self.index.read().await.find_similar_users(user_id, &pool_query);
        let pool_truncated = pool.len() >= self.config.candidate_pool_size;
        let similarity: HashMap<String, f64> = pool
            .iter()
            .map(|candidate| (candidate.user_id.clone(), candidate.similarity))
            .collect();

        // 3. Full profiles for the candidates
        let candidate_ids: Vec<String> = pool.into_iter().map(|c| c.user_id).collect();
        let candidates = self.source.get_profiles(&candidate_ids).await?;
        if candidates.len() < candidate_ids.len() {
            warn!(
                user_id,
                missing = candidate_ids.len() - candidates.len(),
                "indexed candidates missing from profile source"
            );
        }

        // 4. Score and rank
        let mut matches: Vec<ScoredMatch> = candidates
            .iter()
            .map(|candidate| {
                let vector_similarity = similarity.get(&candidate.id).copied().unwrap_or(0.0);
                let score = self.scorer.score(&profile, candidate, vector_similarity);
                ScoredMatch {
                    user: ProfileSummary::from(candidate),
                    compatibility_score: score.score,
                    match_reasons: score.reasons,
                    vector_similarity,
                }
            })
            .collect();
        matches.sort_by(compare_matches);

        info!(
            user_id,
            candidates = candidate_ids.len(),
            excluded = excluded.len(),
            pool_truncated,
            ranked = matches.len(),
            "computed matches"
        );
        Ok(RankedList {
            matches,
            excluded,
            pool_truncated,
        })
    }

    /// Best match not in `exclude_ids`, for one-at-a-time swiping.
    pub async fn next_match(&self, user_id: &str, exclude_ids: Vec<String>) -> MatchResult<Option<ScoredMatch>> {
        let query = MatchQuery {
            limit: 1,
            min_score: self.config.default_min_score,
            exclude_ids,
            refresh: false,
        };
        Ok(self.find_matches(user_id, &query).await?.into_iter().next())
    }

    /// Full compatibility report between two users.
    ///
    /// # Errors
    /// - `MatchError::InvalidArgument` if both ids are the same
    /// - `MatchError::NotFound` if either user is unknown
    pub async fn get_compatibility(&self, user_a: &str, user_b: &str) -> MatchResult<CompatibilityReport> {
        if user_a == user_b {
            return Err(MatchError::InvalidArgument(
                "cannot compare a user with themselves".to_string(),
            ));
        }

        let profile_a = self.load_profile(user_a).await?;
        let profile_b = self.load_profile(user_b).await?;
        self.ensure_indexed(&profile_a).await;
        self.ensure_indexed(&profile_b).await;

        let vector_similarity = self.index.read().await.calculate_similarity(user_a, user_b);
        Ok(self.scorer.report(&profile_a, &profile_b, vector_similarity))
    }

    /// Rank users against a free-text query.
    ///
    /// # Errors
    /// Returns `MatchError::InvalidArgument` if the query is blank or `limit` is zero
    pub async fn search_by_text(&self, query: &str, limit: usize) -> MatchResult<Vec<TextSearchResult>> {
        if query.trim().is_empty() {
            return Err(MatchError::InvalidArgument("search query is required".to_string()));
        }
        if limit == 0 {
            return Err(MatchError::InvalidArgument(
                "limit must be a positive integer".to_string(),
            ));
        }

        let options = TextSearchOptions {
            limit,
            min_score: self.config.text_search_min_score,
        };
        let hits = self.index.write().await.search_by_text(query, &options);

        let ids: Vec<String> = hits.iter().map(|hit| hit.user_id.clone()).collect();
        let profiles: HashMap<String, Profile> = self
            .source
            .get_profiles(&ids)
            .await?
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();

        Ok(hits
            .into_iter()
            .map(|hit| TextSearchResult {
                user: profiles.get(&hit.user_id).map(ProfileSummary::from),
                user_id: hit.user_id,
                score: hit.score,
                metadata: hit.metadata,
            })
            .collect())
    }

    /// Drop the cached match list for a user.
    pub async fn clear_cache(&self, user_id: &str) -> bool {
        self.cache.invalidate(user_id).await
    }

    /// Re-read one profile from the source and re-index it.
    ///
    /// Clears the user's cached matches. A user the source no longer knows is
    /// removed from the index instead.
    pub async fn sync_user_to_vector_store(&self, user_id: &str) -> MatchResult<SyncOutcome> {
        let outcome = match self.source.get_profile(user_id).await {
            Ok(profile) => {
                let position = self.index.write().await.add_user(user_id, &profile);
                SyncOutcome::Indexed { position }
            }
            Err(StorageError::NotFound(_)) => {
                let was_indexed = self.index.write().await.remove_user(user_id);
                SyncOutcome::Removed { was_indexed }
            }
            Err(e) => return Err(e.into()),
        };

        self.cache.invalidate(user_id).await;
        debug!(user_id, ?outcome, "synced user");
        Ok(outcome)
    }

    /// Rebuild the whole index from the source.
    ///
    /// Always a full rebuild; every cached list is dropped because its scores
    /// came from the previous corpus snapshot. Returns the number of users indexed.
    pub async fn sync_all_users(&self) -> MatchResult<usize> {
        let profiles = self.source.get_all_profiles().await?;
        let count = self.index.write().await.rebuild_index(&profiles);
        self.cache.clear().await;
        info!(users = count, "synced all users");
        Ok(count)
    }

    /// Remove a user from the index and drop their cached matches.
    pub async fn remove_user(&self, user_id: &str) -> bool {
        let removed = self.index.write().await.remove_user(user_id);
        self.cache.invalidate(user_id).await;
        removed
    }
}

/// Descending by score, then by vector similarity, then ascending by id.
fn compare_matches(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    b.compatibility_score
        .cmp(&a.compatibility_score)
        .then_with(|| {
            b.vector_similarity
                .partial_cmp(&a.vector_similarity)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.user.id.cmp(&b.user.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use crate::storage::StorageResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;
    use tokio::sync::Notify;

    // Profile source that counts lookups and can be told to fail
    struct CountingSource {
        inner: MemoryStore,
        profile_lookups: AtomicUsize,
        should_fail: bool,
    }

    impl CountingSource {
        fn new(profiles: Vec<Profile>) -> Self {
            Self {
                inner: MemoryStore::with_profiles(profiles),
                profile_lookups: AtomicUsize::new(0),
                should_fail: false,
            }
        }

        fn with_failure() -> Self {
            Self {
                should_fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn lookups(&self) -> usize {
            self.profile_lookups.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn get_profile(&self, user_id: &str) -> StorageResult<Profile> {
            self.profile_lookups.fetch_add(1, AtomicOrdering::SeqCst);
            if self.should_fail {
                return Err(StorageError::ConnectionError("Mock source failure".to_string()));
            }
            self.inner.get_profile(user_id).await
        }

        async fn get_profiles(&self, user_ids: &[String]) -> StorageResult<Vec<Profile>> {
            self.inner.get_profiles(user_ids).await
        }

        async fn get_all_profiles(&self) -> StorageResult<Vec<Profile>> {
            self.inner.get_all_profiles().await
        }

        async fn count_profiles(&self) -> StorageResult<usize> {
            self.inner.count_profiles().await
        }
    }

    // Profile source whose first batch lookup parks until released
    struct GatedSource {
        inner: MemoryStore,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedSource {
        fn new(profiles: Vec<Profile>) -> Self {
            Self {
                inner: MemoryStore::with_profiles(profiles),
                gated: AtomicBool::new(false),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }

        fn gate_next_batch(&self) {
            self.gated.store(true, AtomicOrdering::SeqCst);
        }
    }

    #[async_trait]
    impl ProfileSource for GatedSource {
        async fn get_profile(&self, user_id: &str) -> StorageResult<Profile> {
            self.inner.get_profile(user_id).await
        }

        async fn get_profiles(&self, user_ids: &[String]) -> StorageResult<Vec<Profile>> {
            if self.gated.swap(false, AtomicOrdering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.get_profiles(user_ids).await
        }

        async fn get_all_profiles(&self) -> StorageResult<Vec<Profile>> {
            self.inner.get_all_profiles().await
        }

        async fn count_profiles(&self) -> StorageResult<usize> {
            self.inner.count_profiles().await
        }
    }

    fn student(id: &str, courses: &[&str]) -> Profile {
        Profile::new(id)
            .with_name(id)
            .with_bio("computer science student")
            .with_courses(courses)
            .with_learning_style("visual")
            .with_department("Computer Science")
    }

    fn campus() -> Vec<Profile> {
        vec![
            student("alice", &["Algorithms", "Databases", "Compilers"]),
            student("bob", &["Algorithms", "Databases", "Compilers"]),
            student("carol", &["Algorithms", "Databases"]),
            student("dave", &["Algorithms"]),
            student("erin", &["Operating Systems"]),
            student("frank", &["Networks", "Algorithms"]),
            Profile::new("zoe").with_bio("ceramics and pottery"),
        ]
    }

    async fn service_with(profiles: Vec<Profile>) -> (Arc<CountingSource>, MatchService<CountingSource>) {
        let source = Arc::new(CountingSource::new(profiles));
        let service = MatchService::new(Arc::clone(&source), MatchConfig::default()).unwrap();
        service.sync_all_users().await.unwrap();
        (source, service)
    }

    #[test]
    fn test_match_query_defaults() {
        let query = MatchQuery::default();
        assert_eq!(query.limit, 20);
        assert_eq!(query.min_score, 40);
        assert!(query.exclude_ids.is_empty());
        assert!(!query.refresh);
    }

    #[tokio::test]
    async fn test_find_matches_sorted_and_thresholded() {
        let (_, service) = service_with(campus()).await;
        let matches = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)))
            .await
            .unwrap();

        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.user.id != "alice"));
        for pair in matches.windows(2) {
            assert!(pair[0].compatibility_score >= pair[1].compatibility_score);
        }
        assert_eq!(matches[0].user.id, "bob");
        assert!(matches.iter().all(|m| m.compatibility_score <= 100));
        assert!(matches.iter().all(|m| (0.0..=1.0).contains(&m.vector_similarity)));
    }

    #[tokio::test]
    async fn test_min_score_above_ceiling_is_always_empty() {
        let (_, service) = service_with(campus()).await;
        let query = MatchQuery::new(Some(50), Some(101));
        assert!(service.find_matches("alice", &query).await.unwrap().is_empty());
        assert!(service
            .find_matches("alice", &query.clone().refreshed())
            .await
            .unwrap()
            .is_empty());

        // also when a looser list is already cached
        service.find_matches("bob", &MatchQuery::new(None, Some(0))).await.unwrap();
        assert!(service.find_matches("bob", &query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_serves_prefix_without_recompute() {
        let (source, service) = service_with(campus()).await;

        let first = service
            .find_matches("alice", &MatchQuery::new(Some(2), Some(0)))
            .await
            .unwrap();
        let lookups_after_first = source.lookups();

        let second = service
            .find_matches("alice", &MatchQuery::new(Some(20), Some(0)))
            .await
            .unwrap();

        assert_eq!(source.lookups(), lookups_after_first);
        assert_eq!(first.len(), 2);
        assert!(second.len() > first.len());
        assert_eq!(&second[..first.len()], &first[..]);
        assert_eq!(service.cache_stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_refresh_recomputes() {
        let (source, service) = service_with(campus()).await;
        service.find_matches("alice", &MatchQuery::default()).await.unwrap();
        let before = source.lookups();

        service
            .find_matches("alice", &MatchQuery::default().refreshed())
            .await
            .unwrap();
        assert_eq!(source.lookups(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_recomputes() {
        let (source, service) = service_with(campus()).await;
        service.find_matches("alice", &MatchQuery::default()).await.unwrap();
        let before = source.lookups();

        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        service.find_matches("alice", &MatchQuery::default()).await.unwrap();
        assert_eq!(source.lookups(), before);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        service.find_matches("alice", &MatchQuery::default()).await.unwrap();
        assert_eq!(source.lookups(), before + 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (_, service) = service_with(campus()).await;
        match service.find_matches("ghost", &MatchQuery::default()).await {
            Err(MatchError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let (_, service) = service_with(campus()).await;
        let result = service.find_matches("alice", &MatchQuery::new(Some(0), None)).await;
        assert!(matches!(result, Err(MatchError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_storage_error_propagation() {
        let source = Arc::new(CountingSource::with_failure());
        let service = MatchService::new(source, MatchConfig::default()).unwrap();
        match service.find_matches("alice", &MatchQuery::default()).await {
            Err(MatchError::StorageError(_)) => {}
            other => panic!("Expected StorageError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unindexed_user_is_added_on_demand() {
        let source = Arc::new(CountingSource::new(campus()));
        let service = MatchService::new(Arc::clone(&source), MatchConfig::default()).unwrap();

        // nothing indexed yet: alice is added, but has no one to match against
        let matches = service.find_matches("alice", &MatchQuery::new(None, Some(0))).await.unwrap();
        assert!(matches.is_empty());
        assert_eq!(service.index_stats().await.indexed_users, 1);
    }

    #[tokio::test]
    async fn test_exclusions_apply_to_fresh_and_cached_lists() {
        let (_, service) = service_with(campus()).await;
        let query = MatchQuery::new(None, Some(0)).excluding(["bob".to_string()]);

        let fresh = service.find_matches("alice", &query).await.unwrap();
        assert!(fresh.iter().all(|m| m.user.id != "bob"));

        let (_, service) = service_with(campus()).await;
        service.find_matches("alice", &MatchQuery::new(None, Some(0))).await.unwrap();
        let cached = service.find_matches("alice", &query).await.unwrap();
        assert!(cached.iter().all(|m| m.user.id != "bob"));
    }

    #[tokio::test]
    async fn test_next_match_walks_the_list() {
        let (_, service) = service_with(campus()).await;
        let first = service.next_match("alice", Vec::new()).await.unwrap().unwrap();
        let second = service
            .next_match("alice", vec![first.user.id.clone()])
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first.user.id, second.user.id);
        assert!(first.compatibility_score >= second.compatibility_score);
    }

    #[tokio::test]
    async fn test_swiping_past_candidate_pool_cap() {
        let mut profiles: Vec<Profile> = (0..6)
            .map(|i| student(&format!("peer{}", i), &["Algorithms", "Databases"]))
            .collect();
        profiles.push(student("me", &["Algorithms", "Databases"]));

        let source = Arc::new(CountingSource::new(profiles));
        let config = MatchConfig {
            candidate_pool_size: 3,
            ..MatchConfig::default()
        };
        let service = MatchService::new(Arc::clone(&source), config).unwrap();
        service.sync_all_users().await.unwrap();

        let mut seen: Vec<String> = Vec::new();
        while let Some(next) = service.next_match("me", seen.clone()).await.unwrap() {
            assert!(!seen.contains(&next.user.id));
            seen.push(next.user.id);
            assert!(seen.len() <= 6);
        }
        assert_eq!(seen.len(), 6);

        // pool refilled past the excluded ids
        let query = MatchQuery::new(None, Some(0))
            .excluding(seen[..3].iter().cloned())
            .refreshed();
        let rest = service.find_matches("me", &query).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert!(rest.iter().all(|m| !seen[..3].contains(&m.user.id)));
    }

    #[tokio::test]
    async fn test_list_built_with_exclusions_not_reused_without_them() {
        let (source, service) = service_with(campus()).await;
        let query = MatchQuery::new(None, Some(0)).excluding(["bob".to_string()]);
        service.find_matches("alice", &query).await.unwrap();
        let before = source.lookups();

        let all = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)))
            .await
            .unwrap();
        assert!(all.iter().any(|m| m.user.id == "bob"));
        assert_eq!(source.lookups(), before + 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_computation_is_not_cached() {
        let source = Arc::new(GatedSource::new(campus()));
        let service = Arc::new(MatchService::new(Arc::clone(&source), MatchConfig::default()).unwrap());
        service.sync_all_users().await.unwrap();

        source.gate_next_batch();
        let in_flight = tokio::spawn({
            let service = Arc::clone(&service);
            async move {
                service
                    .find_matches("alice", &MatchQuery::new(None, Some(0)))
                    .await
            }
        });
        source.entered.notified().await;

        // zoe switches to computer science while alice's list is being built
        source
            .inner
            .upsert_profile(student("zoe", &["Algorithms", "Databases", "Compilers"]))
            .await;
        service.sync_user_to_vector_store("zoe").await.unwrap();
        service.clear_cache("alice").await;
        source.release.notify_one();

        let stale = in_flight.await.unwrap().unwrap();
        assert!(stale.iter().all(|m| m.user.id != "zoe"));
        assert_eq!(service.cache_stats().await.stale_writes, 1);

        let current = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)))
            .await
            .unwrap();
        assert!(current.iter().any(|m| m.user.id == "zoe"));
    }

    #[tokio::test]
    async fn test_sync_user_clears_cache_and_reindexes() {
        let source = Arc::new(CountingSource::new(campus()));
        let service = MatchService::new(Arc::clone(&source), MatchConfig::default()).unwrap();
        service.sync_all_users().await.unwrap();

        let before = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)))
            .await
            .unwrap();
        assert!(before.iter().all(|m| m.user.id != "zoe"));

        // zoe picks up computer science
        source.inner.upsert_profile(student("zoe", &["Algorithms", "Databases", "Compilers"])).await;
        let outcome = service.sync_user_to_vector_store("zoe").await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Indexed { .. }));
        service.clear_cache("alice").await;

        let after = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)))
            .await
            .unwrap();
        assert!(after.iter().any(|m| m.user.id == "zoe"));
        assert_eq!(service.index_stats().await.orphaned_documents, 1);
    }

    #[tokio::test]
    async fn test_sync_removed_user() {
        let (source, service) = service_with(campus()).await;
        source.inner.delete_profile("bob").await;

        let outcome = service.sync_user_to_vector_store("bob").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Removed { was_indexed: true });

        let matches = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)).refreshed())
            .await
            .unwrap();
        assert!(matches.iter().all(|m| m.user.id != "bob"));
    }

    #[tokio::test]
    async fn test_sync_all_users_rebuilds_and_clears_cache() {
        let (_, service) = service_with(campus()).await;
        service.find_matches("alice", &MatchQuery::default()).await.unwrap();
        service.sync_user_to_vector_store("bob").await.unwrap();
        assert_eq!(service.index_stats().await.orphaned_documents, 1);

        let count = service.sync_all_users().await.unwrap();
        assert_eq!(count, 7);
        assert_eq!(service.index_stats().await.orphaned_documents, 0);
        assert_eq!(service.cache_stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_get_compatibility() {
        let (_, service) = service_with(campus()).await;
        let report = service.get_compatibility("alice", "carol").await.unwrap();

        assert!(report.score <= 100);
        assert_eq!(report.breakdown.course_overlap.common, 2);
        assert_eq!(report.breakdown.learning_style.score, 1.0);
        assert_eq!(report.breakdown.same_department.points, 5.0);
        assert!(report.reasons[0].starts_with("Taking 2 common courses"));

        let symmetric = service.get_compatibility("carol", "alice").await.unwrap();
        assert_eq!(report.vector_similarity, symmetric.vector_similarity);

        assert!(matches!(
            service.get_compatibility("alice", "alice").await,
            Err(MatchError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.get_compatibility("alice", "ghost").await,
            Err(MatchError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_by_text() {
        let (_, service) = service_with(campus()).await;
        let corpus_before = service.index_stats().await.corpus_documents;

        let results = service.search_by_text("pottery", 10).await.unwrap();
        assert_eq!(results[0].user_id, "zoe");
        assert_eq!(results[0].user.as_ref().map(|u| u.id.as_str()), Some("zoe"));

        for query in ["algorithms", "databases compilers", "nothing matches this"] {
            service.search_by_text(query, 5).await.unwrap();
        }
        assert_eq!(service.index_stats().await.corpus_documents, corpus_before);

        assert!(matches!(
            service.search_by_text("   ", 10).await,
            Err(MatchError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.search_by_text("algorithms", 0).await,
            Err(MatchError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_user() {
        let (_, service) = service_with(campus()).await;
        assert!(service.remove_user("bob").await);
        let matches = service
            .find_matches("alice", &MatchQuery::new(None, Some(0)))
            .await
            .unwrap();
        assert!(matches.iter().all(|m| m.user.id != "bob"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MatchConfig::default();
        config.weights.vector_similarity = 90.0;
        let result = MatchService::new(Arc::new(MemoryStore::new()), config);
        assert!(matches!(result, Err(MatchError::ConfigError(_))));
    }
}
