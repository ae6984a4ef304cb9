pub mod embedding;
pub mod enrollment;
pub mod extractor;
pub mod matcher;
pub mod pose;
pub mod profile;
pub mod scorer;

pub use embedding::{Embedding, EmbeddingKind, FacialState, ENCODER_DIMENSION};

pub use enrollment::{aggregate, mean_embedding, AggregatedEmbedding};

#[cfg(feature = "dlib")]
pub use extractor::DlibEncoder;
pub use extractor::{
    center_fingerprint, decode_payload, BoundingBox, EmbeddingExtractor, EncoderModelConfig,
    EnvModelPathResolver, ExtractFailure, FaceEncoder, FaceEncodingRecord, FaceModelPaths,
    ModelPathResolver, FALLBACK_DIMENSION,
};

pub use matcher::{adaptive_threshold, AdaptiveMatcher, GalleryEntry, GalleryMatch};

pub use pose::{
    positions_agree, validate_position, validate_position_collection, Planar, PoseTolerance,
    Position, Rotational,
};

pub use profile::FacialProfile;

pub use scorer::{
    cosine_similarity, euclidean_distance, euclidean_prefix_distance, DistanceMatch,
    MatchDecision, Metric, SimilarityScorer,
};
