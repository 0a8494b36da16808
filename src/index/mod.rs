//! Similarity index.
//!
//! The index owns a term-weighting corpus and a `user id → document` map.
//! It answers pairwise similarity, top-k candidate retrieval and free-text
//! search queries by scanning every indexed user. The scan is linear in the
//! number of users, which is the accepted cost at campus scale.
//!
//! Updating a user adds a new corpus document and repoints the map entry;
//! the previous document is left in the corpus as an orphan. Orphans still
//! influence IDF weights until [`SimilarityIndex::rebuild_index`] resets the
//! corpus from the current set of profiles.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{Profile, ProfileMetadata, SimilarUser, TextSearchHit};
use crate::vectorizer::tfidf::TfIdfCorpus;
use crate::vectorizer::{cosine_similarity, profile_text, TermVector, TermWeighting};

/// Index entry for one user.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Position of the user's live document in the corpus
    pub position: usize,

    /// The lowercase text the document was built from
    pub profile_text: String,

    pub metadata: ProfileMetadata,
}

/// Parameters for [`SimilarityIndex::find_similar_users`].
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    /// Maximum number of candidates to return
    pub limit: usize,

    /// Candidates below this cosine similarity are dropped
    pub min_similarity: f64,

    /// Users that must not appear in the result
    pub exclude_ids: HashSet<String>,
}

impl Default for SimilarityQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            min_similarity: 0.1,
            exclude_ids: HashSet::new(),
        }
    }
}

/// Parameters for [`SimilarityIndex::search_by_text`].
#[derive(Debug, Clone, Copy)]
pub struct TextSearchOptions {
    pub limit: usize,
    pub min_score: f64,
}

impl Default for TextSearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: 0.1,
        }
    }
}

/// Size counters for the index and its corpus.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub indexed_users: usize,
    pub corpus_documents: usize,

    /// Corpus documents no user entry points at anymore
    pub orphaned_documents: usize,
}

/// In-memory similarity index over user profiles.
#[derive(Debug, Default)]
pub struct SimilarityIndex<W: TermWeighting = TfIdfCorpus> {
    corpus: W,
    entries: HashMap<String, IndexEntry>,
}

impl SimilarityIndex<TfIdfCorpus> {
    /// Create an empty index backed by a TF-IDF corpus.
    pub fn new() -> Self {
        Self::with_model(TfIdfCorpus::new())
    }
}

impl<W: TermWeighting> SimilarityIndex<W> {
    /// Create an empty index on top of a custom term-weighting model.
    pub fn with_model(corpus: W) -> Self {
        Self {
            corpus,
            entries: HashMap::new(),
        }
    }

    /// Vectorize a profile and register it under `user_id`.
    ///
    /// Re-adding an existing user points the entry at the new document;
    /// the old one is orphaned. Returns the new corpus position.
    pub fn add_user(&mut self, user_id: &str, profile: &Profile) -> usize {
        let text = profile_text(profile);
        let position = self.corpus.add_document(&text);

        let previous = self.entries.insert(
            user_id.to_string(),
            IndexEntry {
                position,
                profile_text: text,
                metadata: ProfileMetadata::from(profile),
            },
        );

        if let Some(previous) = previous {
            debug!(
                user_id,
                old_position = previous.position,
                new_position = position,
                "replaced indexed profile"
            );
        }
        position
    }

    /// Drop a user's entry. The corpus document stays as an orphan.
    pub fn remove_user(&mut self, user_id: &str) -> bool {
        self.entries.remove(user_id).is_some()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn user_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, user_id: &str) -> Option<&IndexEntry> {
        self.entries.get(user_id)
    }

    pub fn metadata(&self, user_id: &str) -> Option<&ProfileMetadata> {
        self.entries.get(user_id).map(|entry| &entry.metadata)
    }

    /// Number of documents in the corpus, orphans included.
    pub fn corpus_len(&self) -> usize {
        self.corpus.len()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            indexed_users: self.entries.len(),
            corpus_documents: self.corpus.len(),
            orphaned_documents: self.corpus.len().saturating_sub(self.entries.len()),
        }
    }

    fn term_vector(&self, user_id: &str) -> Option<TermVector> {
        let entry = self.entries.get(user_id)?;
        self.corpus.term_vector(entry.position)
    }

    /// Cosine similarity between two indexed users' TF-IDF vectors.
    ///
    /// Returns 0.0 when either user is unknown or has an empty document.
    pub fn calculate_similarity(&self, user_a: &str, user_b: &str) -> f64 {
        match (self.term_vector(user_a), self.term_vector(user_b)) {
            (Some(a), Some(b)) => cosine_similarity(&a, &b),
            _ => 0.0,
        }
    }

    /// Rank every other indexed user by similarity to `user_id`.
    ///
    /// Returns an empty list when `user_id` is not indexed.
    pub fn find_similar_users(&self, user_id: &str, query: &SimilarityQuery) -> Vec<SimilarUser> {
        let Some(target) = self.term_vector(user_id) else {
            debug!(user_id, "similarity scan requested for unindexed user");
            return Vec::new();
        };

        let mut candidates: Vec<SimilarUser> = self
            .entries
            .iter()
            .filter(|(id, _)| id.as_str() != user_id && !query.exclude_ids.contains(id.as_str()))
            .filter_map(|(id, entry)| {
                let vector = self.corpus.term_vector(entry.position)?;
                let similarity = cosine_similarity(&target, &vector);
                (similarity >= query.min_similarity).then(|| SimilarUser {
                    user_id: id.clone(),
                    similarity,
                    metadata: entry.metadata.clone(),
                })
            })
            .collect();

        candidates.sort_by(|a, b| rank_order(a.similarity, &a.user_id, b.similarity, &b.user_id));
        candidates.truncate(query.limit);
        candidates
    }

    /// Score every indexed user against a free-text query.
    ///
    /// The query is added to the corpus as a transient document so that it is
    /// weighted with the same IDF snapshot as the profiles. The transient
    /// document is removed on every exit path.
    pub fn search_by_text(&mut self, query: &str, options: &TextSearchOptions) -> Vec<TextSearchHit> {
        let text = query.to_lowercase();
        let Self { corpus, entries } = self;

        let transient = TransientDocument::add(corpus, &text);
        let Some(query_vector) = transient.term_vector() else {
            return Vec::new();
        };

        let mut hits: Vec<TextSearchHit> = entries
            .iter()
            .filter_map(|(id, entry)| {
                let vector = transient.corpus().term_vector(entry.position)?;
                let score = cosine_similarity(&query_vector, &vector);
                (score >= options.min_score).then(|| TextSearchHit {
                    user_id: id.clone(),
                    score,
                    metadata: entry.metadata.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| rank_order(a.score, &a.user_id, b.score, &b.user_id));
        hits.truncate(options.limit);
        hits
    }

    /// Drop every document and entry.
    pub fn clear(&mut self) {
        self.corpus.clear();
        self.entries.clear();
    }

    /// Reset the corpus and re-add every profile.
    ///
    /// When `profiles` repeats an id, the last occurrence wins and the earlier
    /// ones are never added, so the rebuilt corpus holds no orphaned
    /// documents. This is the only operation that discards them. Returns the
    /// number of indexed users afterwards.
    pub fn rebuild_index(&mut self, profiles: &[Profile]) -> usize {
        let orphans = self.stats().orphaned_documents;
        self.clear();

        let last: HashMap<&str, usize> = profiles
            .iter()
            .enumerate()
            .map(|(position, profile)| (profile.id.as_str(), position))
            .collect();
        for (position, profile) in profiles.iter().enumerate() {
            if last.get(profile.id.as_str()) == Some(&position) {
                self.add_user(&profile.id, profile);
            }
        }

        info!(
            users = self.entries.len(),
            discarded_orphans = orphans,
            "rebuilt similarity index"
        );
        self.entries.len()
    }
}

/// Descending by score, then ascending by user id.
fn rank_order(score_a: f64, id_a: &str, score_b: f64, id_b: &str) -> Ordering {
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then_with(|| id_a.cmp(id_b))
}

/// A corpus document that is removed again when dropped.
struct TransientDocument<'a, W: TermWeighting> {
    corpus: &'a mut W,
    position: usize,
}

impl<'a, W: TermWeighting> TransientDocument<'a, W> {
    fn add(corpus: &'a mut W, text: &str) -> Self {
        let position = corpus.add_document(text);
        Self { corpus, position }
    }

    fn corpus(&self) -> &W {
        &*self.corpus
    }

    fn term_vector(&self) -> Option<TermVector> {
        self.corpus.term_vector(self.position)
    }
}

impl<W: TermWeighting> Drop for TransientDocument<'_, W> {
    fn drop(&mut self) {
        if !self.corpus.remove_document(self.position) {
            warn!(position = self.position, "failed to remove transient query document");
        }
    }
}
