//! Core data models for the study-buddy matching engine.
//!
//! This module contains the profile projection consumed from the profile
//! source, the metadata snapshot kept by the similarity index, interaction
//! records, and the ranked match entries handed back to callers.
//!
//! Profile fields arrive in loose shapes (courses as plain strings or as
//! `{ "name": ... }` objects, arrays that may be `null`). They are normalized
//! here, at the deserialization boundary, so every downstream component works
//! with plain `Vec<String>` lists.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Deserializer, Serialize};

/// Study environment preferences attached to a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyPreferences {
    /// Preferred environment (e.g., "library", "cafe")
    #[serde(default)]
    pub environment: Option<String>,

    /// Preferred group size (e.g., "small", "pair")
    #[serde(default)]
    pub group_size: Option<String>,

    /// Subjects the user wants to study with others
    #[serde(default, deserialize_with = "nullable_list")]
    pub subjects: Vec<String>,
}

/// Read-only projection of a user's attributes, as provided by the profile source.
///
/// Every field except `id` may be absent. Absent fields never cause errors:
/// the vectorizer skips them and the scorer falls back to neutral sub-scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique user identifier (key into the similarity index)
    #[serde(alias = "_id")]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Free-text biography
    #[serde(default)]
    pub bio: Option<String>,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub skills: Vec<String>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub interests: Vec<String>,

    /// Course names; accepts `"Algorithms"` or `{ "name": "Algorithms", ... }`.
    /// Course objects without a name are skipped.
    #[serde(default, deserialize_with = "course_names")]
    pub courses: Vec<String>,

    #[serde(default)]
    pub major: Option<String>,

    #[serde(default)]
    pub department: Option<String>,

    /// Learning style tag (e.g., "visual", "reading_writing")
    #[serde(default)]
    pub learning_style: Option<String>,

    #[serde(default)]
    pub study_preferences: Option<StudyPreferences>,

    /// Coarse time-slot tags (e.g., "monday_morning")
    #[serde(default, deserialize_with = "nullable_list")]
    pub available_hours: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CourseRef {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn course_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let courses = Option::<Vec<CourseRef>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(courses
        .into_iter()
        .filter_map(|course| match course {
            CourseRef::Name(name) => Some(name),
            CourseRef::Object { name } => name,
        })
        .collect())
}

impl Profile {
    /// Create an empty profile with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_bio(mut self, bio: &str) -> Self {
        self.bio = Some(bio.to_string());
        self
    }

    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.skills = to_owned_list(skills);
        self
    }

    pub fn with_interests(mut self, interests: &[&str]) -> Self {
        self.interests = to_owned_list(interests);
        self
    }

    pub fn with_courses(mut self, courses: &[&str]) -> Self {
        self.courses = to_owned_list(courses);
        self
    }

    pub fn with_major(mut self, major: &str) -> Self {
        self.major = Some(major.to_string());
        self
    }

    pub fn with_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }

    pub fn with_learning_style(mut self, style: &str) -> Self {
        self.learning_style = Some(style.to_string());
        self
    }

    pub fn with_study_preferences(mut self, preferences: StudyPreferences) -> Self {
        self.study_preferences = Some(preferences);
        self
    }

    pub fn with_available_hours(mut self, hours: &[&str]) -> Self {
        self.available_hours = to_owned_list(hours);
        self
    }

    /// Lowercased learning style, or `None` when missing or blank.
    pub fn learning_style_key(&self) -> Option<String> {
        non_blank_key(self.learning_style.as_deref())
    }

    /// Lowercased department, or `None` when missing or blank.
    pub fn department_key(&self) -> Option<String> {
        non_blank_key(self.department.as_deref())
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn non_blank_key(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

/// Lowercase, trim and deduplicate a list of tags, keeping first-seen order.
pub fn normalize_terms(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

/// Structured signals snapshotted into the similarity index alongside a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    /// Normalized (lowercased, deduplicated) course names
    pub courses: Vec<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub learning_style: Option<String>,
    pub study_preferences: StudyPreferences,
    pub available_hours: Vec<String>,
    pub department: Option<String>,
}

impl From<&Profile> for ProfileMetadata {
    fn from(profile: &Profile) -> Self {
        Self {
            courses: normalize_terms(&profile.courses),
            skills: profile.skills.clone(),
            interests: normalize_terms(&profile.interests),
            learning_style: profile.learning_style.clone(),
            study_preferences: profile.study_preferences.clone().unwrap_or_default(),
            available_hours: normalize_terms(&profile.available_hours),
            department: profile.department.clone(),
        }
    }
}

/// Public-facing subset of a profile returned with each match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub courses: Vec<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub learning_style: Option<String>,
    pub department: Option<String>,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            bio: profile.bio.clone(),
            courses: profile.courses.clone(),
            skills: profile.skills.clone(),
            interests: profile.interests.clone(),
            learning_style: profile.learning_style.clone(),
            department: profile.department.clone(),
        }
    }
}

/// A candidate returned by the similarity index's top-k scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarUser {
    pub user_id: String,

    /// Cosine similarity of the TF-IDF vectors (0.0 to 1.0)
    pub similarity: f64,

    pub metadata: ProfileMetadata,
}

/// A free-text search hit from the similarity index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSearchHit {
    pub user_id: String,
    pub score: f64,
    pub metadata: ProfileMetadata,
}

/// One entry of a ranked match list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMatch {
    /// Summary of the candidate profile
    pub user: ProfileSummary,

    /// Composite compatibility score (0 to 100)
    pub compatibility_score: u8,

    /// Human-readable explanations, most significant first
    pub match_reasons: Vec<String>,

    /// Raw cosine similarity kept for transparency
    pub vector_similarity: f64,
}

/// A user's decision about a suggested study buddy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Like,
    Pass,
    Superlike,
}

impl InteractionAction {
    /// Whether the action expresses interest (counts toward a mutual match).
    pub fn is_positive(self) -> bool {
        matches!(self, InteractionAction::Like | InteractionAction::Superlike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionAction::Like => "like",
            InteractionAction::Pass => "pass",
            InteractionAction::Superlike => "superlike",
        }
    }
}

impl fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown interaction action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid action '{0}': must be like, pass, or superlike")]
pub struct ParseActionError(pub String);

impl FromStr for InteractionAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(InteractionAction::Like),
            "pass" => Ok(InteractionAction::Pass),
            "superlike" => Ok(InteractionAction::Superlike),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}

/// A recorded like/pass/superlike decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub user_id: String,
    pub target_user_id: String,
    pub action: InteractionAction,
    pub timestamp: SystemTime,
}

impl InteractionRecord {
    /// Create a record stamped with the current time.
    pub fn new(user_id: &str, target_user_id: &str, action: InteractionAction) -> Self {
        Self {
            user_id: user_id.to_string(),
            target_user_id: target_user_id.to_string(),
            action,
            timestamp: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courses_accept_strings_and_objects() {
        let json = r#"{
            "id": "u1",
            "courses": ["Algorithms", {"name": "Databases", "code": "CS-340"}]
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.courses, vec!["Algorithms", "Databases"]);
    }

    #[test]
    fn test_unnamed_course_objects_are_skipped() {
        let json = r#"{
            "id": "u1",
            "courses": [{"code": "CS-101"}, "Algorithms", {"name": null}, {"name": "Logic"}]
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.courses, vec!["Algorithms", "Logic"]);
    }

    #[test]
    fn test_null_and_missing_fields_become_empty() {
        let json = r#"{"_id": "u2", "skills": null, "availableHours": null}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, "u2");
        assert!(profile.skills.is_empty());
        assert!(profile.available_hours.is_empty());
        assert!(profile.courses.is_empty());
        assert!(profile.learning_style.is_none());
    }

    #[test]
    fn test_study_preferences_camel_case() {
        let json = r#"{
            "id": "u3",
            "studyPreferences": {"environment": "library", "groupSize": "small", "subjects": ["math"]}
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        let prefs = profile.study_preferences.unwrap();
        assert_eq!(prefs.environment.as_deref(), Some("library"));
        assert_eq!(prefs.group_size.as_deref(), Some("small"));
        assert_eq!(prefs.subjects, vec!["math"]);
    }

    #[test]
    fn test_normalize_terms() {
        let items = vec![
            " Algorithms ".to_string(),
            "algorithms".to_string(),
            "".to_string(),
            "Databases".to_string(),
        ];
        assert_eq!(normalize_terms(&items), vec!["algorithms", "databases"]);
    }

    #[test]
    fn test_blank_keys_are_absent() {
        let profile = Profile::new("u").with_learning_style("  ").with_department("Math");
        assert!(profile.learning_style_key().is_none());
        assert_eq!(profile.department_key().as_deref(), Some("math"));
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("like".parse::<InteractionAction>(), Ok(InteractionAction::Like));
        assert_eq!("superlike".parse::<InteractionAction>(), Ok(InteractionAction::Superlike));
        assert!("LIKE".parse::<InteractionAction>().is_err());
        assert!("block".parse::<InteractionAction>().is_err());
        assert!(InteractionAction::Superlike.is_positive());
        assert!(!InteractionAction::Pass.is_positive());
    }

    #[test]
    fn test_metadata_snapshot_normalizes_lists() {
        let profile = Profile::new("u")
            .with_courses(&["Algorithms", "ALGORITHMS"])
            .with_available_hours(&["Monday_Morning"]);
        let metadata = ProfileMetadata::from(&profile);
        assert_eq!(metadata.courses, vec!["algorithms"]);
        assert_eq!(metadata.available_hours, vec!["monday_morning"]);
    }
}
