//! Profile vectorization.
//!
//! This module turns a profile into a single lowercase text document and
//! defines the interface of the term-weighting model that documents are
//! registered in. The default model is the TF-IDF corpus in [`tfidf`].
//!
//! Term matching is exact-token only: no stemming, no stopword removal.

pub mod tfidf;

use std::collections::BTreeMap;

use crate::models::Profile;

/// Sparse term → weight mapping.
///
/// A `BTreeMap` keeps iteration in term order, which makes similarity sums
/// independent of argument order.
pub type TermVector = BTreeMap<String, f64>;

/// Trait for corpus-wide term-weighting models.
///
/// Documents are addressed by the position returned from `add_document`.
/// Positions are permanent handles within one corpus snapshot; weights of
/// two documents are only comparable when read from the same snapshot.
pub trait TermWeighting: Send + Sync {
    /// Register a document and return its position.
    fn add_document(&mut self, text: &str) -> usize;

    /// Remove the document at `position`.
    ///
    /// Returns `false` when the model cannot remove that document; the entry
    /// then stays in the corpus as an orphan until the next `clear`.
    fn remove_document(&mut self, position: usize) -> bool;

    /// Drop every document.
    fn clear(&mut self);

    /// Number of documents currently in the corpus, orphans included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Weighted term vector of the document at `position`.
    fn term_vector(&self, position: usize) -> Option<TermVector>;
}

/// Build the text document for a profile.
///
/// Fields are concatenated in a fixed order (bio, description, skills,
/// interests, courses, major, department, learning style, study preferences)
/// and the result is lowercased. Missing fields contribute nothing.
pub fn profile_text(profile: &Profile) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.extend(profile.bio.iter().cloned());
    parts.extend(profile.description.iter().cloned());

    if !profile.skills.is_empty() {
        parts.push(profile.skills.join(" "));
    }
    if !profile.interests.is_empty() {
        parts.push(profile.interests.join(" "));
    }
    if !profile.courses.is_empty() {
        parts.push(profile.courses.join(" "));
    }

    parts.extend(profile.major.iter().cloned());
    parts.extend(profile.department.iter().cloned());

    if let Some(style) = &profile.learning_style {
        parts.push(style.replace('_', " "));
    }

    if let Some(preferences) = &profile.study_preferences {
        parts.extend(preferences.environment.iter().cloned());
        parts.extend(preferences.group_size.iter().cloned());
        if !preferences.subjects.is_empty() {
            parts.push(preferences.subjects.join(" "));
        }
    }

    parts.join(" ").to_lowercase()
}

/// Split text into terms on every character that is not alphanumeric or `_`.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

/// Cosine similarity between two sparse term vectors.
///
/// Returns 0.0 if either vector has zero magnitude. For non-negative weights
/// the result lies in [0, 1] and `cosine_similarity(a, b) == cosine_similarity(b, a)`.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn magnitude(vector: &TermVector) -> f64 {
    vector.values().map(|w| w * w).sum::<f64>().sqrt()
}
