use std::env;
use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::{Embedding, ENCODER_DIMENSION};

const LANDMARK_ENV: &str = "DLIB_LANDMARK_MODEL";
const ENCODER_ENV: &str = "DLIB_ENCODER_MODEL";

/// Half-size of the square center crop used by the fingerprint fallback.
const FALLBACK_CROP_HALF: u32 = 100;
/// Side of the grid the fallback crop is resampled to before flattening.
pub const FALLBACK_GRID: u32 = 16;
/// Length of a fingerprint embedding (grid cells times RGB channels).
pub const FALLBACK_DIMENSION: usize = (FALLBACK_GRID * FALLBACK_GRID * 3) as usize;
const NORM_EPSILON: f32 = 1e-6;

/// Why an extraction produced no embedding. Logged, never returned past `extract`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractFailure {
    #[error("payload is empty")]
    EmptyInput,
    #[error("high-accuracy encoder required but not loaded")]
    NoBackendAvailable,
    #[error("payload could not be decoded: {0}")]
    DecodeFailure(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("numeric failure: {0}")]
    NumericFailure(String),
}

#[derive(Debug, Clone)]
pub struct EncoderModelConfig {
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: u32,
}

#[derive(Debug, Clone)]
pub struct FaceModelPaths {
    pub landmark: PathBuf,
    pub encoder: PathBuf,
}

pub trait ModelPathResolver {
    fn resolve(&self, config: &EncoderModelConfig) -> AppResult<FaceModelPaths>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvModelPathResolver;

impl ModelPathResolver for EnvModelPathResolver {
    fn resolve(&self, config: &EncoderModelConfig) -> AppResult<FaceModelPaths> {
        let landmark = config
            .landmark_model
            .clone()
            .or_else(|| env::var(LANDMARK_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "landmark predictor",
                flag: "--landmark-model",
                env: LANDMARK_ENV,
            })?;

        let encoder = config
            .encoder_model
            .clone()
            .or_else(|| env::var(ENCODER_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "face encoding network",
                flag: "--encoder-model",
                env: ENCODER_ENV,
            })?;

        Ok(FaceModelPaths { landmark, encoder })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncodingRecord {
    pub bounding_box: BoundingBox,
    pub encoding: Vec<f32>,
}

/// Detects faces and encodes them with a high-accuracy network.
///
/// Implementations return one record per detected face in detector order.
/// Only the first record is used by [`EmbeddingExtractor`].
pub trait FaceEncoder {
    fn encode_faces(&self, image: &RgbImage) -> AppResult<Vec<FaceEncodingRecord>>;
}

#[cfg(feature = "dlib")]
pub use dlib::DlibEncoder;

#[cfg(feature = "dlib")]
mod dlib {
    use dlib_face_recognition::{
        FaceDetector, FaceDetectorTrait, FaceEncoderNetwork, FaceEncoderTrait, ImageMatrix,
        LandmarkPredictor, LandmarkPredictorTrait,
    };
    use image::RgbImage;
    use tracing::debug;

    use super::{BoundingBox, FaceEncoder, FaceEncodingRecord, FaceModelPaths};
    use crate::errors::{AppError, AppResult};

    pub struct DlibEncoder {
        detector: FaceDetector,
        predictor: LandmarkPredictor,
        encoder: FaceEncoderNetwork,
        jitters: u32,
    }

    impl DlibEncoder {
        pub fn new(models: &FaceModelPaths, jitters: u32) -> AppResult<Self> {
            debug!(path = %models.landmark.display(), "loading landmark model");
            let predictor = LandmarkPredictor::open(&models.landmark).map_err(|message| {
                AppError::ModelLoad {
                    path: models.landmark.clone(),
                    message,
                }
            })?;
            debug!(path = %models.encoder.display(), "loading encoder model");
            let encoder = FaceEncoderNetwork::open(&models.encoder).map_err(|message| {
                AppError::ModelLoad {
                    path: models.encoder.clone(),
                    message,
                }
            })?;
            let detector = FaceDetector::new();

            Ok(Self {
                detector,
                predictor,
                encoder,
                jitters,
            })
        }
    }

    impl FaceEncoder for DlibEncoder {
        fn encode_faces(&self, image: &RgbImage) -> AppResult<Vec<FaceEncodingRecord>> {
            let matrix = ImageMatrix::from_image(image);
            let locations = self.detector.face_locations(&matrix);

            let mut landmarks = Vec::with_capacity(locations.len());
            for rect in locations.iter() {
                landmarks.push(self.predictor.face_landmarks(&matrix, rect));
            }

            let encodings = self
                .encoder
                .get_face_encodings(&matrix, &landmarks, self.jitters);

            let mut records = Vec::with_capacity(locations.len());
            for (rect, encoding) in locations.iter().zip(encodings.iter()) {
                records.push(FaceEncodingRecord {
                    bounding_box: BoundingBox {
                        left: rect.left,
                        top: rect.top,
                        right: rect.right,
                        bottom: rect.bottom,
                    },
                    encoding: encoding.as_ref().iter().map(|v| *v as f32).collect(),
                });
            }

            Ok(records)
        }
    }
}

type BoxedEncoder = Box<dyn FaceEncoder + Send + Sync>;

/// Turns a raw image payload into an [`Embedding`].
///
/// With an encoder loaded the first detected face is encoded to 128 values.
/// Without one, a normalized fingerprint of the image center is produced,
/// unless the extractor was told to require the encoder.
pub struct EmbeddingExtractor {
    encoder: Option<BoxedEncoder>,
    require_encoder: bool,
}

impl EmbeddingExtractor {
    pub fn fallback_only() -> Self {
        Self {
            encoder: None,
            require_encoder: false,
        }
    }

    pub fn with_encoder(encoder: impl FaceEncoder + Send + Sync + 'static) -> Self {
        Self {
            encoder: Some(Box::new(encoder)),
            require_encoder: false,
        }
    }

    pub fn require_encoder(mut self, required: bool) -> Self {
        self.require_encoder = required;
        self
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn extract(&self, raw: &str) -> Option<Embedding> {
        match self.try_extract(raw) {
            Ok(embedding) => {
                debug!(
                    target: "facelock::extract",
                    len = embedding.len(),
                    "extracted embedding"
                );
                Some(embedding)
            }
            Err(failure) => {
                debug!(target: "facelock::extract", reason = %failure, "no embedding extracted");
                None
            }
        }
    }

    pub fn try_extract(&self, raw: &str) -> Result<Embedding, ExtractFailure> {
        if raw.trim().is_empty() {
            return Err(ExtractFailure::EmptyInput);
        }
        if self.encoder.is_none() && self.require_encoder {
            return Err(ExtractFailure::NoBackendAvailable);
        }

        let image = decode_payload(raw)?;
        match &self.encoder {
            Some(encoder) => encode_first_face(encoder.as_ref(), &image),
            None => center_fingerprint(&image),
        }
    }
}

impl std::fmt::Debug for EmbeddingExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingExtractor")
            .field("has_encoder", &self.has_encoder())
            .field("require_encoder", &self.require_encoder)
            .finish()
    }
}

/// Decodes `"<header>,<base64>"` or bare base64 into an RGB frame.
pub fn decode_payload(raw: &str) -> Result<RgbImage, ExtractFailure> {
    let encoded = match raw.split_once(',') {
        Some((_header, data)) => data,
        None => raw,
    };
    // Line-wrapped payloads are accepted.
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|err| ExtractFailure::DecodeFailure(err.to_string()))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|err| ExtractFailure::DecodeFailure(err.to_string()))?;
    Ok(image.to_rgb8())
}

fn encode_first_face(
    encoder: &(dyn FaceEncoder + Send + Sync),
    image: &RgbImage,
) -> Result<Embedding, ExtractFailure> {
    let faces = encoder
        .encode_faces(image)
        .map_err(|err| ExtractFailure::NumericFailure(err.to_string()))?;
    debug!(target: "facelock::extract", faces = faces.len(), "encoder detections");

    // Multi-face frames are not disambiguated; the detector's first face wins.
    let first = faces.into_iter().next().ok_or(ExtractFailure::NoFaceDetected)?;
    if first.encoding.len() < ENCODER_DIMENSION {
        return Err(ExtractFailure::NumericFailure(format!(
            "encoder returned {} values",
            first.encoding.len()
        )));
    }
    if first.encoding.iter().any(|v| !v.is_finite()) {
        return Err(ExtractFailure::NumericFailure(
            "encoder returned non-finite values".into(),
        ));
    }
    Ok(Embedding::new(first.encoding))
}

/// Fallback embedding: center crop, resample to a small grid, L2-normalize.
///
/// Pixels are flattened in B, G, R order so fingerprints line up with those
/// enrolled by OpenCV-based capture clients.
pub fn center_fingerprint(image: &RgbImage) -> Result<Embedding, ExtractFailure> {
    let (width, height) = image.dimensions();
    let (cx, cy) = (width / 2, height / 2);
    let x0 = cx.saturating_sub(FALLBACK_CROP_HALF);
    let y0 = cy.saturating_sub(FALLBACK_CROP_HALF);
    let x1 = (cx + FALLBACK_CROP_HALF).min(width);
    let y1 = (cy + FALLBACK_CROP_HALF).min(height);
    if x1 <= x0 || y1 <= y0 {
        return Err(ExtractFailure::NumericFailure("empty center crop".into()));
    }

    let crop = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();
    let grid = imageops::resize(&crop, FALLBACK_GRID, FALLBACK_GRID, FilterType::Triangle);

    let mut values: Vec<f32> = grid
        .pixels()
        .flat_map(|pixel| {
            let [r, g, b] = pixel.0;
            [b, g, r]
        })
        .map(f32::from)
        .collect();
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    let denominator = norm + NORM_EPSILON;
    for value in values.iter_mut() {
        *value /= denominator;
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ExtractFailure::NumericFailure(
            "fingerprint normalization produced non-finite values".into(),
        ));
    }
    Ok(Embedding::new(values))
}
