use serde::Serialize;

use crate::faces::embedding::{is_encoder_length, ENCODER_DIMENSION};

/// Encoder-space distance below which two embeddings are the same person.
pub const ENCODER_MATCH_DISTANCE: f32 = 0.6;
/// Cosine similarity above which two fingerprints are the same person.
pub const FINGERPRINT_MATCH_SIMILARITY: f32 = 0.9;
/// Default tolerance for [`SimilarityScorer::compare_with_distance`].
pub const DEFAULT_GALLERY_TOLERANCE: f32 = 0.6;
/// Without the encoder, gallery distances are raw pixel-space distances and the
/// tolerance is scaled by this factor.
pub const FALLBACK_TOLERANCE_SCALE: f32 = 100.0;
/// Distance reported when a gallery comparison cannot be computed.
pub const FAILED_COMPARISON_DISTANCE: f32 = 1.0;

const COSINE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Distance,
    Similarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchDecision {
    pub matched: bool,
    pub metric: Metric,
    pub score: f32,
    pub threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceMatch {
    pub matched: bool,
    pub distance: f32,
}

impl DistanceMatch {
    fn failed() -> Self {
        Self {
            matched: false,
            distance: FAILED_COMPARISON_DISTANCE,
        }
    }
}

/// Euclidean distance over at most the first `dims` values of each operand.
///
/// Returns `None` when the truncated operands differ in length or the result
/// is not finite.
pub fn euclidean_prefix_distance(lhs: &[f32], rhs: &[f32], dims: usize) -> Option<f32> {
    let lhs = &lhs[..lhs.len().min(dims)];
    let rhs = &rhs[..rhs.len().min(dims)];
    euclidean_distance(lhs, rhs)
}

pub fn euclidean_distance(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
    if lhs.len() != rhs.len() {
        return None;
    }
    let distance = lhs
        .iter()
        .zip(rhs.iter())
        .map(|(l, r)| (l - r) * (l - r))
        .sum::<f32>()
        .sqrt();
    distance.is_finite().then_some(distance)
}

/// `dot / (|lhs| * |rhs| + 1e-6)`; `None` on length mismatch or non-finite input.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
    if lhs.len() != rhs.len() {
        return None;
    }

    let mut dot = 0.0;
    let mut norm_lhs = 0.0;
    let mut norm_rhs = 0.0;
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        dot += l * r;
        norm_lhs += l * l;
        norm_rhs += r * r;
    }

    let similarity = dot / (norm_lhs.sqrt() * norm_rhs.sqrt() + COSINE_EPSILON);
    similarity.is_finite().then_some(similarity)
}

/// Pairwise embedding comparison.
///
/// `encoder_available` only affects [`compare_with_distance`]; [`compare`]
/// picks its metric from the stored vector alone.
///
/// [`compare`]: SimilarityScorer::compare
/// [`compare_with_distance`]: SimilarityScorer::compare_with_distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityScorer {
    encoder_available: bool,
}

impl SimilarityScorer {
    pub fn new(encoder_available: bool) -> Self {
        Self { encoder_available }
    }

    /// Scores `live` against `stored`.
    ///
    /// Stored vectors of encoder length (128 or 129) use Euclidean distance on
    /// the 128-d prefix; anything else uses cosine similarity.
    pub fn score(&self, stored: &[f32], live: &[f32]) -> Option<MatchDecision> {
        if stored.is_empty() || live.is_empty() {
            return None;
        }

        if is_encoder_length(stored.len()) {
            if live.len() < ENCODER_DIMENSION {
                return None;
            }
            let distance = euclidean_prefix_distance(stored, live, ENCODER_DIMENSION)?;
            Some(MatchDecision {
                matched: distance < ENCODER_MATCH_DISTANCE,
                metric: Metric::Distance,
                score: distance,
                threshold: ENCODER_MATCH_DISTANCE,
            })
        } else {
            let similarity = cosine_similarity(stored, live)?;
            Some(MatchDecision {
                matched: similarity > FINGERPRINT_MATCH_SIMILARITY,
                metric: Metric::Similarity,
                score: similarity,
                threshold: FINGERPRINT_MATCH_SIMILARITY,
            })
        }
    }

    pub fn compare(&self, stored: &[f32], live: &[f32]) -> bool {
        self.score(stored, live)
            .map(|decision| decision.matched)
            .unwrap_or(false)
    }

    /// Raw Euclidean distance against `tolerance`, used for gallery search.
    ///
    /// Without the encoder the acceptance bound is `tolerance * 100`. That is a
    /// different scale from both branches of [`compare`](Self::compare) and is
    /// kept as-is so gallery decisions match existing deployments.
    pub fn compare_with_distance(&self, known: &[f32], live: &[f32], tolerance: f32) -> DistanceMatch {
        if known.is_empty() || live.is_empty() {
            return DistanceMatch::failed();
        }
        let Some(distance) = euclidean_distance(known, live) else {
            return DistanceMatch::failed();
        };

        let bound = if self.encoder_available {
            tolerance
        } else {
            tolerance * FALLBACK_TOLERANCE_SCALE
        };
        DistanceMatch {
            matched: distance <= bound,
            distance,
        }
    }
}
