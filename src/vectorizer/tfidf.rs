//! TF-IDF corpus implementation of [`TermWeighting`].
//!
//! Weights follow the classic scheme used by the profile matcher:
//!
//! - `tf(t, d)`: raw count of term `t` in document `d`
//! - `idf(t)`: `1 + ln(N / (1 + df(t)))`, `N` = documents in the corpus
//! - `w(t, d) = tf(t, d) * idf(t)`
//!
//! The corpus cannot remove documents from the middle without shifting every
//! later position, so only the most recently added document can be removed.
//! Anything else becomes an orphan that still counts toward `N` and `df`
//! until the corpus is cleared.

use std::collections::{BTreeMap, HashMap};

use super::{tokenize, TermVector, TermWeighting};

#[derive(Debug, Clone, Default)]
struct Document {
    term_counts: BTreeMap<String, usize>,
}

/// In-memory TF-IDF corpus.
#[derive(Debug, Clone, Default)]
pub struct TfIdfCorpus {
    documents: Vec<Document>,

    /// Number of documents containing each term
    document_frequency: HashMap<String, usize>,
}

impl TfIdfCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inverse document frequency of a term in the current snapshot.
    pub fn idf(&self, term: &str) -> f64 {
        let total = self.documents.len() as f64;
        let containing = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
        1.0 + (total / (1.0 + containing)).ln()
    }

    /// Raw count of a term in the document at `position`.
    pub fn term_frequency(&self, term: &str, position: usize) -> usize {
        self.documents
            .get(position)
            .and_then(|doc| doc.term_counts.get(term))
            .copied()
            .unwrap_or(0)
    }
}

impl TermWeighting for TfIdfCorpus {
    fn add_document(&mut self, text: &str) -> usize {
        let mut term_counts = BTreeMap::new();
        for term in tokenize(text) {
            *term_counts.entry(term.to_string()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }

        self.documents.push(Document { term_counts });
        self.documents.len() - 1
    }

    fn remove_document(&mut self, position: usize) -> bool {
        if position + 1 != self.documents.len() {
            return false;
        }
        let Some(document) = self.documents.pop() else {
            return false;
        };

        for term in document.term_counts.keys() {
            if let Some(count) = self.document_frequency.get_mut(term) {
                *count -= 1;
                if *count == 0 {
                    self.document_frequency.remove(term);
                }
            }
        }
        true
    }

    fn clear(&mut self) {
        self.documents.clear();
        self.document_frequency.clear();
    }

    fn len(&self) -> usize {
        self.documents.len()
    }

    fn term_vector(&self, position: usize) -> Option<TermVector> {
        let document = self.documents.get(position)?;
        Some(
            document
                .term_counts
                .iter()
                .map(|(term, &count)| (term.clone(), count as f64 * self.idf(term)))
                .collect(),
        )
    }
}
