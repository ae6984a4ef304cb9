use serde::{Deserialize, Serialize};

/// Output width of the high-accuracy face encoder.
pub const ENCODER_DIMENSION: usize = 128;

/// Some stored encoder vectors carry one trailing value after the 128-d body.
const ENCODER_PADDED_DIMENSION: usize = ENCODER_DIMENSION + 1;

/// Which algorithm produced an embedding, inferred from its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    Encoder,
    Fingerprint,
}

/// Immutable feature vector describing one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kind(&self) -> EmbeddingKind {
        if is_encoder_length(self.0.len()) {
            EmbeddingKind::Encoder
        } else {
            EmbeddingKind::Fingerprint
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

pub(crate) fn is_encoder_length(len: usize) -> bool {
    len == ENCODER_DIMENSION || len == ENCODER_PADDED_DIMENSION
}

/// Where a user's reference embeddings come from for one matching operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FacialState<'a> {
    Collection(&'a [Embedding]),
    Legacy(&'a Embedding),
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_length() {
        assert_eq!(Embedding::new(vec![0.0; 128]).kind(), EmbeddingKind::Encoder);
        assert_eq!(Embedding::new(vec![0.0; 129]).kind(), EmbeddingKind::Encoder);
        assert_eq!(
            Embedding::new(vec![0.0; 768]).kind(),
            EmbeddingKind::Fingerprint
        );
        assert_eq!(Embedding::new(vec![]).kind(), EmbeddingKind::Fingerprint);
    }

    #[test]
    fn serializes_as_plain_array() {
        let embedding = Embedding::new(vec![0.5, -1.0]);
        let json = serde_json::to_string(&embedding).unwrap();
        assert_eq!(json, "[0.5,-1.0]");
        let back: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, embedding);
    }
}
