//! Compatibility scoring.
//!
//! Combines the TF-IDF vector similarity of two profiles with structured
//! signals into one 0–100 score:
//!
//! | signal              | default weight | normalized sub-score                     |
//! |---------------------|----------------|------------------------------------------|
//! | vector similarity   | 30             | cosine similarity                        |
//! | shared courses      | 25             | `min(shared / 3, 1)`                     |
//! | learning style      | 15             | 1.0 equal, 0.75 compatible, 0.5 / 0.3    |
//! | availability        | 15             | Jaccard of time slots, 0.5 if unknown    |
//! | shared interests    | 10             | `min(shared / 5, 1)`                     |
//! | same department     | 5              | 1.0 on match                             |
//!
//! Every sub-score stays in [0, 1] and the weights sum to at most 100, so the
//! rounded total never leaves [0, 100].
//!
//! Score and reasons are both derived from one [`PairComparison`], which keeps
//! the explanation list consistent with the number it explains.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{normalize_terms, Profile};

/// Learning-style pairs that study well together (besides identical styles).
const COMPATIBLE_STYLES: &[(&str, &str)] = &[
    ("visual", "reading_writing"),
    ("auditory", "kinesthetic"),
    ("collaborative", "social"),
    ("independent", "solitary"),
];

const FALLBACK_REASON: &str = "Compatible study preferences";

/// Tunable weights and saturation caps for the composite score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringWeights {
    pub vector_similarity: f64,
    pub shared_courses: f64,
    pub learning_style: f64,
    pub availability: f64,
    pub shared_interests: f64,
    pub same_department: f64,

    /// Number of shared courses at which the course sub-score saturates
    pub course_saturation: usize,

    /// Number of shared interests at which the interest sub-score saturates
    pub interest_saturation: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            vector_similarity: 30.0,
            shared_courses: 25.0,
            learning_style: 15.0,
            availability: 15.0,
            shared_interests: 10.0,
            same_department: 5.0,
            course_saturation: 3,
            interest_saturation: 5,
        }
    }
}

impl ScoringWeights {
    /// Sum of all signal weights (the maximum achievable score).
    pub fn total(&self) -> f64 {
        self.signal_weights().iter().sum()
    }

    pub(crate) fn signal_weights(&self) -> [f64; 6] {
        [
            self.vector_similarity,
            self.shared_courses,
            self.learning_style,
            self.availability,
            self.shared_interests,
            self.same_department,
        ]
    }
}

/// Learning-style compatibility in [0, 1].
///
/// Identical styles score 1.0, pairs from the compatibility table 0.75,
/// known but unrelated styles 0.3. Missing data on either side is neutral (0.5).
pub fn learning_style_score(style_a: Option<&str>, style_b: Option<&str>) -> f64 {
    let key = |s: Option<&str>| s.map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty());
    let (Some(a), Some(b)) = (key(style_a), key(style_b)) else {
        return 0.5;
    };

    if a == b {
        return 1.0;
    }
    let compatible = COMPATIBLE_STYLES
        .iter()
        .any(|&(x, y)| (a == x && b == y) || (a == y && b == x));
    if compatible {
        0.75
    } else {
        0.3
    }
}

/// Jaccard similarity of two sets of time-slot tags (case-insensitive).
///
/// Returns a neutral 0.5 when either side has no availability data.
pub fn availability_overlap(hours_a: &[String], hours_b: &[String]) -> f64 {
    let a: HashSet<String> = normalize_terms(hours_a).into_iter().collect();
    let b: HashSet<String> = normalize_terms(hours_b).into_iter().collect();
    if a.is_empty() || b.is_empty() {
        return 0.5;
    }

    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f64 / union as f64
}

/// Items of `a` that also appear in `b`, compared case-insensitively.
///
/// Keeps the spelling and order of `a`; each item is reported once.
pub fn shared_terms(a: &[String], b: &[String]) -> Vec<String> {
    let keys_b: HashSet<String> = normalize_terms(b).into_iter().collect();
    let mut seen = HashSet::new();
    a.iter()
        .filter(|item| {
            let key = item.trim().to_lowercase();
            !key.is_empty() && keys_b.contains(&key) && seen.insert(key)
        })
        .map(|item| item.trim().to_string())
        .collect()
}

/// `min(count / cap, 1)`, with a zero cap treated as already saturated.
fn saturating_ratio(count: usize, cap: usize) -> f64 {
    if cap == 0 {
        return if count > 0 { 1.0 } else { 0.0 };
    }
    (count as f64 / cap as f64).min(1.0)
}

/// Size summary of a set intersection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overlap {
    /// Items present on both sides
    pub common: usize,

    /// Size of the union
    pub total: usize,

    /// `common / max(|a|, |b|, 1)`
    pub percentage: f64,
}

impl Overlap {
    pub fn between(a: &[String], b: &[String]) -> Self {
        let a: HashSet<String> = normalize_terms(a).into_iter().collect();
        let b: HashSet<String> = normalize_terms(b).into_iter().collect();
        let common = a.intersection(&b).count();
        Self {
            common,
            total: a.len() + b.len() - common,
            percentage: common as f64 / a.len().max(b.len()).max(1) as f64,
        }
    }
}

/// All pairwise comparisons the score and the reasons are derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct PairComparison {
    pub vector_similarity: f64,
    pub shared_courses: Vec<String>,
    pub shared_interests: Vec<String>,
    pub learning_style: f64,

    /// Both styles present and equal (case-insensitive)
    pub same_learning_style: Option<String>,

    pub availability: f64,

    /// Department of the first profile when both match (case-insensitive)
    pub same_department: Option<String>,
}

impl PairComparison {
    pub fn between(a: &Profile, b: &Profile, vector_similarity: f64) -> Self {
        let same_learning_style = match (a.learning_style_key(), b.learning_style_key()) {
            (Some(x), Some(y)) if x == y => a.learning_style.clone(),
            _ => None,
        };
        let same_department = match (a.department_key(), b.department_key()) {
            (Some(x), Some(y)) if x == y => a.department.clone(),
            _ => None,
        };

        Self {
            vector_similarity: vector_similarity.clamp(0.0, 1.0),
            shared_courses: shared_terms(&a.courses, &b.courses),
            shared_interests: shared_terms(&a.interests, &b.interests),
            learning_style: learning_style_score(
                a.learning_style.as_deref(),
                b.learning_style.as_deref(),
            ),
            same_learning_style,
            availability: availability_overlap(&a.available_hours, &b.available_hours),
            same_department,
        }
    }

    /// Human-readable reasons for the pairing, most significant first.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        if !self.shared_courses.is_empty() {
            let count = self.shared_courses.len();
            let noun = if count == 1 { "course" } else { "courses" };
            let names = self.shared_courses.iter().take(3).cloned().collect::<Vec<_>>();
            reasons.push(format!("Taking {} common {}: {}", count, noun, names.join(", ")));
        }

        if let Some(style) = &self.same_learning_style {
            reasons.push(format!(
                "Both prefer {} learning",
                style.trim().to_lowercase().replace('_', " ")
            ));
        }

        if !self.shared_interests.is_empty() {
            let names = self.shared_interests.iter().take(3).cloned().collect::<Vec<_>>();
            reasons.push(format!("Shared interests: {}", names.join(", ")));
        }

        if let Some(department) = &self.same_department {
            reasons.push(format!("Both in {} department", department.trim()));
        }

        if self.availability > 0.5 {
            reasons.push("Similar study schedules".to_string());
        }

        if reasons.is_empty() {
            reasons.push(FALLBACK_REASON.to_string());
        }
        reasons
    }
}

/// One signal's normalized sub-score and its weighted contribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalContribution {
    /// Normalized sub-score in [0, 1]
    pub score: f64,
    pub weight: f64,

    /// `score * weight`
    pub points: f64,
}

impl SignalContribution {
    fn new(score: f64, weight: f64) -> Self {
        Self {
            score,
            weight,
            points: score * weight,
        }
    }
}

/// Per-signal breakdown of a composite score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub vector_similarity: SignalContribution,
    pub shared_courses: SignalContribution,
    pub learning_style: SignalContribution,
    pub availability: SignalContribution,
    pub shared_interests: SignalContribution,
    pub same_department: SignalContribution,
    pub course_overlap: Overlap,
    pub interest_overlap: Overlap,
}

impl ScoreBreakdown {
    /// Unrounded composite score.
    pub fn total_points(&self) -> f64 {
        [
            self.vector_similarity,
            self.shared_courses,
            self.learning_style,
            self.availability,
            self.shared_interests,
            self.same_department,
        ]
        .iter()
        .map(|c| c.points)
        .sum()
    }
}

/// Composite score with its explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityScore {
    /// Composite score (0 to 100)
    pub score: u8,
    pub reasons: Vec<String>,
    pub vector_similarity: f64,
}

/// Full pairwise compatibility report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    pub score: u8,
    pub reasons: Vec<String>,
    pub vector_similarity: f64,
    pub breakdown: ScoreBreakdown,
}

/// Weighted multi-signal compatibility scorer.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    weights: ScoringWeights,
}

impl CompatibilityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Per-signal breakdown for a profile pair.
    pub fn breakdown(&self, comparison: &PairComparison, a: &Profile, b: &Profile) -> ScoreBreakdown {
        let w = &self.weights;
        ScoreBreakdown {
            vector_similarity: SignalContribution::new(comparison.vector_similarity, w.vector_similarity),
            shared_courses: SignalContribution::new(
                saturating_ratio(comparison.shared_courses.len(), w.course_saturation),
                w.shared_courses,
            ),
            learning_style: SignalContribution::new(comparison.learning_style, w.learning_style),
            availability: SignalContribution::new(comparison.availability, w.availability),
            shared_interests: SignalContribution::new(
                saturating_ratio(comparison.shared_interests.len(), w.interest_saturation),
                w.shared_interests,
            ),
            same_department: SignalContribution::new(
                if comparison.same_department.is_some() { 1.0 } else { 0.0 },
                w.same_department,
            ),
            course_overlap: Overlap::between(&a.courses, &b.courses),
            interest_overlap: Overlap::between(&a.interests, &b.interests),
        }
    }

    /// Composite 0–100 score for a pair.
    pub fn calculate_compatibility(&self, a: &Profile, b: &Profile, vector_similarity: f64) -> u8 {
        let comparison = PairComparison::between(a, b, vector_similarity);
        to_score(self.breakdown(&comparison, a, b).total_points())
    }

    /// Reasons for a pairing; never contradicts the score.
    pub fn generate_match_reasons(&self, a: &Profile, b: &Profile) -> Vec<String> {
        PairComparison::between(a, b, 0.0).reasons()
    }

    /// Score and reasons in one pass.
    pub fn score(&self, a: &Profile, b: &Profile, vector_similarity: f64) -> CompatibilityScore {
        let comparison = PairComparison::between(a, b, vector_similarity);
        let breakdown = self.breakdown(&comparison, a, b);
        CompatibilityScore {
            score: to_score(breakdown.total_points()),
            reasons: comparison.reasons(),
            vector_similarity: comparison.vector_similarity,
        }
    }

    /// Score, reasons and per-signal breakdown.
    pub fn report(&self, a: &Profile, b: &Profile, vector_similarity: f64) -> CompatibilityReport {
        let comparison = PairComparison::between(a, b, vector_similarity);
        let breakdown = self.breakdown(&comparison, a, b);
        CompatibilityReport {
            score: to_score(breakdown.total_points()),
            reasons: comparison.reasons(),
            vector_similarity: comparison.vector_similarity,
            breakdown,
        }
    }
}

fn to_score(points: f64) -> u8 {
    points.round().clamp(0.0, 100.0) as u8
}
