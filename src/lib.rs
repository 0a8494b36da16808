//! Campus Match - A study-buddy compatibility engine.
//!
//! This library ranks students against each other as potential study
//! partners. Profiles are turned into TF-IDF term vectors for a text
//! similarity signal, which is blended with structured signals (shared
//! courses, learning style, availability, shared interests, department)
//! into a 0–100 compatibility score with human-readable reasons.
//!
//! # Architecture
//!
//! - **models**: Profile records and the result types built from them
//! - **vectorizer**: Profile text extraction, tokenization and TF-IDF weighting
//! - **index**: In-memory similarity index over the vectorized profiles
//! - **scoring**: Weighted multi-signal compatibility scoring and match reasons
//! - **matching**: Match service with candidate retrieval and a per-user TTL cache
//! - **interaction**: Like/pass/superlike recording and mutual-match checks
//! - **storage**: Collaborator traits for profiles and interactions, plus an in-memory store
//! - **config**: Engine configuration
//! - **api**: Request/response DTOs and the caller-facing `MatchEngine`
//!
//! # Workflow
//!
//! 1. Rebuild the index from every profile in the source (`sync_all_users`)
//! 2. Re-sync single profiles as they change (`sync_profile`)
//! 3. Pull a candidate pool from the index by vector similarity
//! 4. Score and rank candidates, cache the ranked list per user
//! 5. Invalidate a user's list whenever they record an interaction
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use campus_match::{MatchConfig, MatchEngine, MatchesRequest, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::from_json_file("profiles.json").await?);
//!     let engine = MatchEngine::new(store, MatchConfig::default())?;
//!     engine.sync_all_users().await?;
//!
//!     let response = engine.get_matches("u1", &MatchesRequest::default()).await?;
//!     for m in response.matches {
//!         println!("{}: {} ({})", m.user.id, m.compatibility_score, m.match_reasons.join("; "));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod index;
pub mod interaction;
pub mod matching;
pub mod models;
pub mod scoring;
pub mod storage;
pub mod vectorizer;

// Re-export commonly used types at the crate root
pub use api::{MatchEngine, MatchesRequest};
pub use config::MatchConfig;
pub use index::SimilarityIndex;
pub use matching::{MatchError, MatchQuery, MatchResult, MatchService};
pub use models::{InteractionAction, Profile, ScoredMatch};
pub use scoring::{CompatibilityScorer, ScoringWeights};
pub use storage::memory::MemoryStore;
pub use storage::{InteractionStore, ProfileSource};
pub use vectorizer::{tfidf::TfIdfCorpus, TermWeighting};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
