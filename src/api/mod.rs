//! Caller-facing API.
//!
//! [`MatchEngine`] bundles the match service and the interaction recorder
//! over one shared store and exposes one method per endpoint of the
//! matchmaking surface. Requests and responses are serde DTOs so that a
//! transport layer can forward JSON bodies and query strings unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MatchConfig;
use crate::interaction::InteractionRecorder;
use crate::matching::{MatchError, MatchQuery, MatchResult, MatchService, SyncOutcome, TextSearchResult};
use crate::models::{InteractionAction, InteractionRecord, ScoredMatch};
use crate::scoring::CompatibilityReport;
use crate::storage::{InteractionStore, ProfileSource};

/// Query parameters of a match list request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchesRequest {
    /// Number of matches to return (default: configured default limit)
    pub limit: Option<usize>,

    /// Minimum compatibility score (default: configured default min score)
    pub min_score: Option<u32>,

    /// Recompute even when a cached list exists
    pub refresh: bool,

    pub exclude_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesResponse {
    pub user_id: String,

    /// Number of matches returned
    pub count: usize,

    /// Matches, best first
    pub matches: Vec<ScoredMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextMatchResponse {
    #[serde(rename = "match")]
    pub next: Option<ScoredMatch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of an interaction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractRequest {
    pub target_user_id: String,

    /// One of `like`, `pass` or `superlike`
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    pub interaction: InteractionRecord,

    /// Both users have liked each other
    pub mutual_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResponse {
    pub compatibility: CompatibilityReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SyncOutcome>,
}

/// Query parameters of a free-text search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The search query text
    pub q: String,

    /// Number of results to return (default: 10)
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub count: usize,
    pub results: Vec<TextSearchResult>,
}

/// Error body returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,

    /// HTTP-style status: 400, 404 or 500
    #[serde(skip)]
    pub status: u16,
}

impl From<&MatchError> for ErrorResponse {
    fn from(err: &MatchError) -> Self {
        let status = match err {
            MatchError::InvalidArgument(_) => 400,
            MatchError::NotFound(_) => 404,
            MatchError::StorageError(_) | MatchError::ConfigError(_) => 500,
        };
        Self {
            success: false,
            message: err.to_string(),
            status,
        }
    }
}

/// The matchmaking engine as seen by a request handler.
pub struct MatchEngine<S: ProfileSource + InteractionStore> {
    service: MatchService<S>,
    recorder: InteractionRecorder<S>,
}

impl<S: ProfileSource + InteractionStore> MatchEngine<S> {
    /// Build an engine over one store that serves both profiles and interactions.
    ///
    /// # Errors
    /// Returns `MatchError::ConfigError` if the configuration is invalid
    pub fn new(store: Arc<S>, config: MatchConfig) -> MatchResult<Self> {
        let service = MatchService::new(Arc::clone(&store), config)?;
        let recorder = InteractionRecorder::new(store, service.cache());
        Ok(Self { service, recorder })
    }

    pub fn service(&self) -> &MatchService<S> {
        &self.service
    }

    /// Ranked matches for the requesting user.
    pub async fn get_matches(&self, user_id: &str, request: &MatchesRequest) -> MatchResult<MatchesResponse> {
        let config = self.service.config();
        let query = MatchQuery {
            limit: request.limit.unwrap_or(config.default_limit),
            min_score: request.min_score.unwrap_or(config.default_min_score),
            exclude_ids: request.exclude_ids.clone(),
            refresh: request.refresh,
        };

        let matches = self.service.find_matches(user_id, &query).await?;
        Ok(MatchesResponse {
            user_id: user_id.to_string(),
            count: matches.len(),
            matches,
        })
    }

    /// The single best match not yet seen, for the swipe interface.
    pub async fn next_match(&self, user_id: &str, exclude_ids: Vec<String>) -> MatchResult<NextMatchResponse> {
        let next = self.service.next_match(user_id, exclude_ids).await?;
        let message = next
            .is_none()
            .then(|| "No more matches available".to_string());
        Ok(NextMatchResponse { next, message })
    }

    pub async fn get_compatibility(&self, user_id: &str, other_user_id: &str) -> MatchResult<CompatibilityResponse> {
        let compatibility = self.service.get_compatibility(user_id, other_user_id).await?;
        Ok(CompatibilityResponse { compatibility })
    }

    /// Record a decision and report whether it completed a mutual match.
    ///
    /// # Errors
    /// Returns `MatchError::InvalidArgument` for an unknown action, a blank
    /// target or a self-interaction; nothing is recorded in that case
    pub async fn record_interaction(&self, user_id: &str, request: &InteractRequest) -> MatchResult<InteractionResponse> {
        let action: InteractionAction = request
            .action
            .parse()
            .map_err(|e: crate::models::ParseActionError| MatchError::InvalidArgument(e.to_string()))?;

        let interaction = self
            .recorder
            .record_interaction(user_id, &request.target_user_id, action)
            .await?;
        let mutual_match = self
            .recorder
            .check_mutual_match(user_id, &request.target_user_id)
            .await?;

        Ok(InteractionResponse {
            interaction,
            mutual_match,
        })
    }

    /// Re-index the requesting user's profile after an edit.
    pub async fn sync_profile(&self, user_id: &str) -> MatchResult<SyncResponse> {
        let outcome = self.service.sync_user_to_vector_store(user_id).await?;
        let message = match outcome {
            SyncOutcome::Indexed { .. } => "Profile synced successfully".to_string(),
            SyncOutcome::Removed { .. } => "Profile no longer exists; removed from index".to_string(),
        };
        Ok(SyncResponse {
            message,
            outcome: Some(outcome),
        })
    }

    pub async fn sync_all_users(&self) -> MatchResult<SyncResponse> {
        let count = self.service.sync_all_users().await?;
        Ok(SyncResponse {
            message: format!("Synced {} users", count),
            outcome: None,
        })
    }

    pub async fn search_by_text(&self, request: &SearchRequest) -> MatchResult<SearchResponse> {
        let results = self.service.search_by_text(&request.q, request.limit).await?;
        Ok(SearchResponse {
            count: results.len(),
            results,
        })
    }

    /// Drop a deleted account from the index.
    pub async fn remove_user(&self, user_id: &str) -> bool {
        self.service.remove_user(user_id).await
    }
}
