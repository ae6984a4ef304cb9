use std::slice;

use serde::{Deserialize, Serialize};

use crate::faces::embedding::{Embedding, FacialState};
use crate::faces::enrollment::AggregatedEmbedding;
use crate::faces::pose::Position;

/// Everything the matchers need to know about one user's face.
///
/// `embeddings` and `positions` hold the sample collections in capture order.
/// The `legacy_*` fields are single-value references from older enrollments
/// and are only consulted while the matching collection is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialProfile {
    #[serde(default)]
    pub embeddings: Vec<Embedding>,
    #[serde(default)]
    pub legacy_embedding: Option<Embedding>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub legacy_position: Option<Position>,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Default for FacialProfile {
    fn default() -> Self {
        Self {
            embeddings: Vec::new(),
            legacy_embedding: None,
            positions: Vec::new(),
            legacy_position: None,
            failed_attempts: 0,
            active: true,
        }
    }
}

impl FacialProfile {
    pub fn facial_state(&self) -> FacialState<'_> {
        if !self.embeddings.is_empty() {
            FacialState::Collection(&self.embeddings)
        } else if let Some(legacy) = &self.legacy_embedding {
            FacialState::Legacy(legacy)
        } else {
            FacialState::None
        }
    }

    pub fn effective_positions(&self) -> &[Position] {
        if !self.positions.is_empty() {
            &self.positions
        } else if let Some(legacy) = &self.legacy_position {
            slice::from_ref(legacy)
        } else {
            &[]
        }
    }

    /// Reference embedding used for gallery search: the legacy enrollment
    /// mean when present, otherwise the first collected sample.
    pub fn gallery_embedding(&self) -> Option<&Embedding> {
        self.legacy_embedding
            .as_ref()
            .or_else(|| self.embeddings.first())
    }

    pub fn sample_count(&self) -> usize {
        self.embeddings.len()
    }

    /// Appends one captured sample during incremental capture. Both
    /// collections grow together; a sample captured without head placement
    /// carries an empty [`Position`], which never agrees with a live pose.
    pub fn add_sample(&mut self, embedding: Embedding, position: Position) {
        self.embeddings.push(embedding);
        self.positions.push(position);
    }

    /// Replaces both sample collections at once.
    pub fn replace_samples(&mut self, embeddings: Vec<Embedding>, positions: Vec<Position>) {
        self.embeddings = embeddings;
        self.positions = positions;
    }

    /// Stores an aggregated enrollment as the single reference and drops the
    /// previously collected samples.
    pub fn enroll(&mut self, aggregated: &AggregatedEmbedding) {
        self.replace_samples(Vec::new(), Vec::new());
        self.legacy_embedding = Some(aggregated.embedding.clone());
    }

    pub fn record_failed_attempt(&mut self) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
    }

    pub fn reset_failed_attempts(&mut self) {
        self.failed_attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_takes_precedence_over_legacy() {
        let mut profile = FacialProfile {
            legacy_embedding: Some(Embedding::new(vec![1.0])),
            ..FacialProfile::default()
        };
        assert!(matches!(profile.facial_state(), FacialState::Legacy(_)));

        profile.add_sample(Embedding::new(vec![2.0]), Position::planar(0.5, 0.5, 1.0));
        match profile.facial_state() {
            FacialState::Collection(items) => assert_eq!(items.len(), 1),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn samples_without_position_keep_collections_aligned() {
        let mut profile = FacialProfile::default();
        profile.add_sample(Embedding::new(vec![1.0]), Position::planar(0.5, 0.5, 1.0));
        profile.add_sample(Embedding::new(vec![2.0]), Position::default());
        assert_eq!(profile.embeddings.len(), profile.positions.len());
        assert!(profile.positions[1].is_empty());
    }

    #[test]
    fn empty_profile_has_no_state() {
        let profile = FacialProfile::default();
        assert_eq!(profile.facial_state(), FacialState::None);
        assert!(profile.effective_positions().is_empty());
        assert!(profile.gallery_embedding().is_none());
    }

    #[test]
    fn legacy_position_backs_empty_collection() {
        let legacy = Position::planar(0.1, 0.2, 1.0);
        let profile = FacialProfile {
            legacy_position: Some(legacy),
            ..FacialProfile::default()
        };
        assert_eq!(profile.effective_positions(), &[legacy]);
    }

    #[test]
    fn replace_samples_discards_previous_collection() {
        let mut profile = FacialProfile::default();
        profile.add_sample(Embedding::new(vec![1.0]), Position::planar(0.0, 0.0, 1.0));
        profile.replace_samples(vec![Embedding::new(vec![3.0]), Embedding::new(vec![4.0])], vec![]);
        assert_eq!(profile.sample_count(), 2);
        assert!(profile.positions.is_empty());
    }

    #[test]
    fn attempt_counter_saturates() {
        let mut profile = FacialProfile {
            failed_attempts: u32::MAX,
            ..FacialProfile::default()
        };
        profile.record_failed_attempt();
        assert_eq!(profile.failed_attempts, u32::MAX);
        profile.reset_failed_attempts();
        assert_eq!(profile.failed_attempts, 0);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let profile: FacialProfile = serde_json::from_str("{}").unwrap();
        assert!(profile.active);
        assert_eq!(profile.failed_attempts, 0);
        assert!(profile.embeddings.is_empty());
    }
}
