//! Collaborator interfaces for profile and interaction storage.
//!
//! The matching engine does not own user data. It reads profile projections
//! through [`ProfileSource`] and hands interaction records to an
//! [`InteractionStore`]. Both are async traits so that database-backed
//! implementations fit without blocking the runtime.
//!
//! [`memory::MemoryStore`] implements both traits in memory and can be
//! seeded from a JSON file.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{InteractionRecord, Profile};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Read access to the source of truth for user profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Get a single profile.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if the user doesn't exist
    async fn get_profile(&self, user_id: &str) -> StorageResult<Profile>;

    /// Get the profiles for a set of ids.
    ///
    /// Unknown ids are skipped; the result order is unspecified.
    async fn get_profiles(&self, user_ids: &[String]) -> StorageResult<Vec<Profile>>;

    /// Get every profile, used for a full index rebuild.
    async fn get_all_profiles(&self) -> StorageResult<Vec<Profile>>;

    /// Get the total number of profiles.
    async fn count_profiles(&self) -> StorageResult<usize>;
}

/// Persistence for like/pass/superlike decisions.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Persist a decision. A later decision for the same pair supersedes earlier ones.
    async fn save_interaction(&self, record: &InteractionRecord) -> StorageResult<()>;

    /// Latest decision `user_id` made about `target_user_id`, if any.
    async fn find_interaction(
        &self,
        user_id: &str,
        target_user_id: &str,
    ) -> StorageResult<Option<InteractionRecord>>;
}
