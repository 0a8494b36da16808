//! Engine configuration.
//!
//! Every policy value of the matcher (cache lifetime, candidate pool size,
//! similarity floors, default paging and the scoring weights) lives in
//! [`MatchConfig`]. Defaults reproduce the production behavior; a JSON file
//! can override any subset of fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::ScoringWeights;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the configuration file
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A value is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Matching engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchConfig {
    /// How long a computed match list is served from cache, in seconds
    pub cache_ttl_secs: u64,

    /// Maximum number of candidates pulled from the similarity index per computation
    pub candidate_pool_size: usize,

    /// Candidates below this vector similarity are not scored at all
    pub candidate_min_similarity: f64,

    /// Result count when the caller gives none
    pub default_limit: usize,

    /// Minimum composite score when the caller gives none
    pub default_min_score: u32,

    /// Minimum similarity for free-text search hits
    pub text_search_min_score: f64,

    pub weights: ScoringWeights,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30 * 60,
            candidate_pool_size: 100,
            candidate_min_similarity: 0.05,
            default_limit: 20,
            default_min_score: 40,
            text_search_min_score: 0.1,
            weights: ScoringWeights::default(),
        }
    }
}

impl MatchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: MatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&contents)
    }

    /// Check that every value is in range.
    ///
    /// Weights must be finite and non-negative and sum to at most 100, so a
    /// composite score can never leave [0, 100].
    pub fn validate(&self) -> ConfigResult<()> {
        let weights = self.weights.signal_weights();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        let total = self.weights.total();
        if total > 100.0 + 1e-9 {
            return Err(ConfigError::Invalid(format!(
                "scoring weights sum to {total}, maximum is 100"
            )));
        }
        if self.weights.course_saturation == 0 || self.weights.interest_saturation == 0 {
            return Err(ConfigError::Invalid(
                "saturation caps must be at least 1".to_string(),
            ));
        }
        if self.candidate_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "candidate pool size must be at least 1".to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid(
                "default limit must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.candidate_min_similarity)
            || !(0.0..=1.0).contains(&self.text_search_min_score)
        {
            return Err(ConfigError::Invalid(
                "similarity floors must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
