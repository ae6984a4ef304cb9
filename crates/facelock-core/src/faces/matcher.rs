use serde::Serialize;
use tracing::debug;

use crate::faces::embedding::{Embedding, FacialState, ENCODER_DIMENSION};
use crate::faces::profile::FacialProfile;
use crate::faces::scorer::{
    euclidean_prefix_distance, MatchDecision, Metric, SimilarityScorer,
    DEFAULT_GALLERY_TOLERANCE,
};

/// Acceptance distance for a user with no failed attempts.
pub const BASE_USER_THRESHOLD: f32 = 0.45;
/// Widening applied per recorded failed attempt.
pub const THRESHOLD_STEP: f32 = 0.03;
/// Upper bound on the widened acceptance distance.
pub const THRESHOLD_CEILING: f32 = 0.55;

/// `min(0.45 + 0.03 * attempts, 0.55)`
pub fn adaptive_threshold(failed_attempts: u32) -> f32 {
    (BASE_USER_THRESHOLD + failed_attempts as f32 * THRESHOLD_STEP).min(THRESHOLD_CEILING)
}

/// One candidate for identity-free login.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry<I> {
    pub identity: I,
    pub embedding: Embedding,
    pub active: bool,
}

impl<I> GalleryEntry<I> {
    pub fn new(identity: I, embedding: Embedding) -> Self {
        Self {
            identity,
            embedding,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryMatch<I> {
    pub identity: Option<I>,
    pub distance: f32,
}

impl<I> GalleryMatch<I> {
    fn none() -> Self {
        Self {
            identity: None,
            distance: f32::INFINITY,
        }
    }

    pub fn is_match(&self) -> bool {
        self.identity.is_some()
    }

    /// `max(0, 1 - distance)`; zero when nothing matched.
    pub fn confidence(&self) -> f32 {
        (1.0 - self.distance).max(0.0)
    }
}

/// Per-user and gallery-wide matching on top of [`SimilarityScorer`].
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveMatcher {
    scorer: SimilarityScorer,
    gallery_tolerance: f32,
}

impl AdaptiveMatcher {
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self {
            scorer,
            gallery_tolerance: DEFAULT_GALLERY_TOLERANCE,
        }
    }

    pub fn with_gallery_tolerance(mut self, tolerance: f32) -> Self {
        self.gallery_tolerance = tolerance;
        self
    }

    pub fn match_against_user(&self, profile: &FacialProfile, live: &Embedding) -> bool {
        self.decide_for_user(profile, live)
            .map(|decision| decision.matched)
            .unwrap_or(false)
    }

    /// Compares `live` with the user's references.
    ///
    /// Collections are walked in stored order and the first entry within the
    /// adaptive threshold wins. Without a collection the legacy reference is
    /// scored by [`SimilarityScorer::score`]. `None` means no comparison was
    /// possible; a malformed collection entry fails the whole check.
    pub fn decide_for_user(
        &self,
        profile: &FacialProfile,
        live: &Embedding,
    ) -> Option<MatchDecision> {
        if live.is_empty() {
            return None;
        }

        let stored = match profile.facial_state() {
            FacialState::None => {
                debug!(target: "facelock::matcher", "user has no enrolled embeddings");
                return None;
            }
            FacialState::Legacy(reference) => {
                return self.scorer.score(reference.as_slice(), live.as_slice());
            }
            FacialState::Collection(stored) => stored,
        };

        let threshold = adaptive_threshold(profile.failed_attempts);
        let mut closest = f32::INFINITY;
        for (index, reference) in stored.iter().enumerate() {
            let Some(distance) =
                euclidean_prefix_distance(reference.as_slice(), live.as_slice(), ENCODER_DIMENSION)
            else {
                debug!(
                    target: "facelock::matcher",
                    index,
                    stored_len = reference.len(),
                    live_len = live.len(),
                    "stored embedding not comparable; rejecting"
                );
                return None;
            };

            if distance < threshold {
                debug!(
                    target: "facelock::matcher",
                    index,
                    distance,
                    threshold,
                    "collection entry within tolerance"
                );
                return Some(MatchDecision {
                    matched: true,
                    metric: Metric::Distance,
                    score: distance,
                    threshold,
                });
            }
            closest = closest.min(distance);
        }

        debug!(
            target: "facelock::matcher",
            candidates = stored.len(),
            closest,
            threshold,
            "no collection entry within tolerance"
        );
        Some(MatchDecision {
            matched: false,
            metric: Metric::Distance,
            score: closest,
            threshold,
        })
    }

    /// Identity-free search: the matching candidate with the smallest distance
    /// wins. Ties keep the earlier candidate.
    pub fn match_against_gallery<I: Clone>(
        &self,
        gallery: &[GalleryEntry<I>],
        live: &Embedding,
    ) -> GalleryMatch<I> {
        let mut best: GalleryMatch<I> = GalleryMatch::none();

        for entry in gallery.iter().filter(|entry| entry.active) {
            let result = self.scorer.compare_with_distance(
                entry.embedding.as_slice(),
                live.as_slice(),
                self.gallery_tolerance,
            );
            if result.matched && result.distance < best.distance {
                best = GalleryMatch {
                    identity: Some(entry.identity.clone()),
                    distance: result.distance,
                };
            }
        }

        debug!(
            target: "facelock::matcher",
            candidates = gallery.len(),
            matched = best.is_match(),
            distance = best.distance,
            "gallery search finished"
        );
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(len: usize, value: f32) -> Embedding {
        Embedding::new(vec![value; len])
    }

    fn profile(embeddings: Vec<Embedding>, attempts: u32) -> FacialProfile {
        FacialProfile {
            embeddings,
            failed_attempts: attempts,
            ..FacialProfile::default()
        }
    }

    fn matcher(encoder_available: bool) -> AdaptiveMatcher {
        AdaptiveMatcher::new(SimilarityScorer::new(encoder_available))
    }

    #[test]
    fn threshold_is_monotone_and_bounded() {
        let mut previous = adaptive_threshold(0);
        assert_eq!(previous, BASE_USER_THRESHOLD);
        for attempts in 1..500 {
            let current = adaptive_threshold(attempts);
            assert!(current >= previous);
            assert!((BASE_USER_THRESHOLD..=THRESHOLD_CEILING).contains(&current));
            previous = current;
        }
        assert_eq!(adaptive_threshold(u32::MAX), THRESHOLD_CEILING);
    }

    #[test]
    fn small_offset_matches_fresh_user() {
        let user = profile(vec![filled(128, 0.0)], 0);
        assert!(matcher(true).match_against_user(&user, &filled(128, 0.01)));
    }

    #[test]
    fn large_offset_rejected_at_ceiling() {
        let user = profile(vec![filled(128, 0.0)], 5);
        let decision = matcher(true)
            .decide_for_user(&user, &filled(128, 0.5))
            .unwrap();
        assert!(!decision.matched);
        assert_eq!(decision.threshold, THRESHOLD_CEILING);
        assert!((decision.score - 5.657).abs() < 1e-2);
    }

    #[test]
    fn failed_attempts_widen_acceptance() {
        // distance sqrt(128) * 0.044 ~= 0.498
        let user = profile(vec![filled(128, 0.0)], 0);
        let live = filled(128, 0.044);
        assert!(!matcher(true).match_against_user(&user, &live));

        let retried = profile(vec![filled(128, 0.0)], 2);
        assert!(matcher(true).match_against_user(&retried, &live));
    }

    #[test]
    fn per_user_search_is_first_match() {
        let user = profile(vec![filled(128, 0.03), filled(128, 0.0)], 0);
        let decision = matcher(true)
            .decide_for_user(&user, &filled(128, 0.0))
            .unwrap();
        assert!(decision.matched);
        // first entry (distance ~0.34) wins over the exact second entry
        assert!(decision.score > 0.3);
    }

    #[test]
    fn collection_compares_only_leading_dimensions() {
        let mut long = vec![0.0f32; 768];
        for value in long.iter_mut().skip(128) {
            *value = 9.0;
        }
        let user = profile(vec![Embedding::new(long)], 0);
        assert!(matcher(false).match_against_user(&user, &filled(768, 0.0)));
    }

    #[test]
    fn incomparable_entry_rejects() {
        let user = profile(vec![filled(64, 0.0), filled(128, 0.0)], 0);
        assert!(!matcher(true).match_against_user(&user, &filled(32, 0.0)));
    }

    #[test]
    fn legacy_reference_uses_scorer() {
        let user = FacialProfile {
            legacy_embedding: Some(filled(128, 0.0)),
            ..FacialProfile::default()
        };
        let decision = matcher(true)
            .decide_for_user(&user, &filled(128, 0.04))
            .unwrap();
        assert_eq!(decision.metric, Metric::Distance);
        assert_eq!(decision.threshold, 0.6);
        assert!(decision.matched);
    }

    #[test]
    fn user_without_embeddings_never_matches() {
        let user = FacialProfile::default();
        assert!(!matcher(true).match_against_user(&user, &filled(128, 0.0)));
        let enrolled = profile(vec![filled(128, 0.0)], 0);
        assert!(!matcher(true).match_against_user(&enrolled, &Embedding::new(vec![])));
    }

    #[test]
    fn gallery_returns_global_minimum() {
        let gallery = vec![
            GalleryEntry::new("far", filled(4, 5.0)),
            GalleryEntry::new("closest", filled(4, 1.0)),
            GalleryEntry::new("near", filled(4, 2.0)),
        ];
        let result = matcher(false).match_against_gallery(&gallery, &filled(4, 0.0));
        assert_eq!(result.identity, Some("closest"));
        assert!((result.distance - 2.0).abs() < 1e-6);
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn gallery_ties_keep_first_candidate() {
        let gallery = vec![
            GalleryEntry::new(1u32, filled(128, 0.01)),
            GalleryEntry::new(2u32, filled(128, -0.01)),
        ];
        let result = matcher(true).match_against_gallery(&gallery, &filled(128, 0.0));
        assert_eq!(result.identity, Some(1));
        assert!((result.confidence() - (1.0 - result.distance)).abs() < 1e-6);
    }

    #[test]
    fn gallery_skips_inactive_candidates() {
        let mut inactive = GalleryEntry::new("inactive", filled(128, 0.0));
        inactive.active = false;
        let gallery = vec![inactive, GalleryEntry::new("active", filled(128, 0.02))];
        let result = matcher(true).match_against_gallery(&gallery, &filled(128, 0.0));
        assert_eq!(result.identity, Some("active"));
    }

    #[test]
    fn gallery_without_match_reports_infinity() {
        let gallery = vec![GalleryEntry::new("a", filled(128, 1.0))];
        let result = matcher(true).match_against_gallery(&gallery, &filled(128, 0.0));
        assert!(!result.is_match());
        assert!(result.distance.is_infinite());
        assert_eq!(result.confidence(), 0.0);

        let empty: Vec<GalleryEntry<&str>> = Vec::new();
        assert!(!matcher(true)
            .match_against_gallery(&empty, &filled(128, 0.0))
            .is_match());
    }

    #[test]
    fn custom_gallery_tolerance_applies() {
        let gallery = vec![GalleryEntry::new("a", filled(128, 0.05))];
        let strict = matcher(true).with_gallery_tolerance(0.5);
        assert!(!strict
            .match_against_gallery(&gallery, &filled(128, 0.0))
            .is_match());
    }
}
