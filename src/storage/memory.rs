//! In-memory storage implementation.
//!
//! [`MemoryStore`] keeps profiles and interactions in `tokio` locks. It backs
//! the command-line tool and serves as the reference collaborator in tests.
//! Profiles can be loaded from a JSON array of profile records.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::{InteractionStore, ProfileSource, StorageError, StorageResult};
use crate::models::{InteractionRecord, Profile};

/// In-memory profile and interaction store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, Profile>>,

    /// Latest decision per (user, target)
    interactions: RwLock<HashMap<(String, String), InteractionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given profiles.
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            profiles: RwLock::new(profiles),
            interactions: RwLock::new(HashMap::new()),
        }
    }

    /// Parse a JSON array of profile records.
    ///
    /// # Errors
    /// Returns `StorageError::SerializationError` if the document is not a
    /// valid profile array
    pub fn from_json_str(json: &str) -> StorageResult<Self> {
        let profiles: Vec<Profile> = serde_json::from_str(json)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        Ok(Self::with_profiles(profiles))
    }

    /// Load a JSON array of profile records from a file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        let store = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            profiles = store.profiles.read().await.len(),
            "loaded profiles"
        );
        Ok(store)
    }

    /// Insert or replace a profile.
    pub async fn upsert_profile(&self, profile: Profile) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }

    /// Delete a profile. Returns whether it existed.
    pub async fn delete_profile(&self, user_id: &str) -> bool {
        self.profiles.write().await.remove(user_id).is_some()
    }
}

#[async_trait]
impl ProfileSource for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> StorageResult<Profile> {
        self.profiles
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_profiles(&self, user_ids: &[String]) -> StorageResult<Vec<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| profiles.get(id).cloned())
            .collect())
    }

    async fn get_all_profiles(&self) -> StorageResult<Vec<Profile>> {
        let mut profiles: Vec<Profile> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }

    async fn count_profiles(&self) -> StorageResult<usize> {
        Ok(self.profiles.read().await.len())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn save_interaction(&self, record: &InteractionRecord) -> StorageResult<()> {
        self.interactions.write().await.insert(
            (record.user_id.clone(), record.target_user_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn find_interaction(
        &self,
        user_id: &str,
        target_user_id: &str,
    ) -> StorageResult<Option<InteractionRecord>> {
        Ok(self
            .interactions
            .read()
            .await
            .get(&(user_id.to_string(), target_user_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionAction;
    use std::io::Write;

    const PROFILES_JSON: &str = r#"[
        {"_id": "u1", "name": "Ada", "courses": [{"name": "Algorithms"}], "learningStyle": "visual"},
        {"id": "u2", "name": "Grace", "courses": ["Compilers"], "skills": null}
    ]"#;

    #[tokio::test]
    async fn test_get_profile() {
        let store = MemoryStore::from_json_str(PROFILES_JSON).unwrap();
        let profile = store.get_profile("u1").await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.courses, vec!["Algorithms"]);

        match store.get_profile("missing").await {
            Err(StorageError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_profiles_skips_unknown_ids() {
        let store = MemoryStore::from_json_str(PROFILES_JSON).unwrap();
        let ids = vec!["u2".to_string(), "ghost".to_string()];
        let profiles = store.get_profiles(&ids).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, "u2");
    }

    #[tokio::test]
    async fn test_get_all_profiles_sorted() {
        let store = MemoryStore::from_json_str(PROFILES_JSON).unwrap();
        let all = store.get_all_profiles().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert_eq!(store.count_profiles().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let store = MemoryStore::new();
        store.upsert_profile(Profile::new("u9").with_bio("first")).await;
        store.upsert_profile(Profile::new("u9").with_bio("second")).await;
        assert_eq!(store.get_profile("u9").await.unwrap().bio.as_deref(), Some("second"));
        assert!(store.delete_profile("u9").await);
        assert!(!store.delete_profile("u9").await);
    }

    #[tokio::test]
    async fn test_course_without_name_keeps_file_loadable() {
        let json = r#"[{"id": "u3", "courses": [{"code": "CS-101"}, {"name": "Compilers"}]}]"#;
        let store = MemoryStore::from_json_str(json).unwrap();
        assert_eq!(store.get_profile("u3").await.unwrap().courses, vec!["Compilers"]);
    }

    #[test]
    fn test_invalid_json() {
        match MemoryStore::from_json_str("{\"id\": \"not an array\"}") {
            Err(StorageError::SerializationError(_)) => {}
            other => panic!("Expected SerializationError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROFILES_JSON.as_bytes()).unwrap();

        let store = MemoryStore::from_json_file(file.path()).await.unwrap();
        assert_eq!(store.count_profiles().await.unwrap(), 2);

        let missing = MemoryStore::from_json_file("/nonexistent/profiles.json").await;
        assert!(matches!(missing, Err(StorageError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_latest_interaction_wins() {
        let store = MemoryStore::new();
        store
            .save_interaction(&InteractionRecord::new("a", "b", InteractionAction::Pass))
            .await
            .unwrap();
        store
            .save_interaction(&InteractionRecord::new("a", "b", InteractionAction::Like))
            .await
            .unwrap();

        let latest = store.find_interaction("a", "b").await.unwrap().unwrap();
        assert_eq!(latest.action, InteractionAction::Like);
        assert!(store.find_interaction("b", "a").await.unwrap().is_none());
    }
}
