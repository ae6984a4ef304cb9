use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::Embedding;
use crate::faces::extractor::EmbeddingExtractor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEmbedding {
    pub embedding: Embedding,
    /// Samples that produced an embedding and went into the mean.
    pub sample_count: usize,
    /// Samples submitted by the caller.
    pub submitted: usize,
}

/// Extracts every sample and averages the survivors element-wise.
///
/// Only fails when no sample yields an embedding.
pub fn aggregate<S: AsRef<str>>(
    extractor: &EmbeddingExtractor,
    samples: &[S],
) -> AppResult<AggregatedEmbedding> {
    let embeddings: Vec<Embedding> = samples
        .iter()
        .enumerate()
        .filter_map(|(index, sample)| {
            let extracted = extractor.extract(sample.as_ref());
            if extracted.is_none() {
                debug!(target: "facelock::enroll", index, "sample discarded");
            }
            extracted
        })
        .collect();

    let aggregated = mean_embedding(&embeddings).ok_or(AppError::NoUsableSamples {
        submitted: samples.len(),
    })?;
    info!(
        target: "facelock::enroll",
        used = aggregated.1,
        submitted = samples.len(),
        len = aggregated.0.len(),
        "aggregated enrollment samples"
    );

    Ok(AggregatedEmbedding {
        embedding: aggregated.0,
        sample_count: aggregated.1,
        submitted: samples.len(),
    })
}

/// Element-wise mean of `embeddings`, with the count actually averaged.
///
/// The first embedding fixes the dimensionality; a later embedding of another
/// length is skipped.
pub fn mean_embedding(embeddings: &[Embedding]) -> Option<(Embedding, usize)> {
    let first = embeddings.first()?;
    let dimension = first.len();
    let mut sums = vec![0.0f64; dimension];
    let mut used = 0usize;

    for (index, embedding) in embeddings.iter().enumerate() {
        if embedding.len() != dimension {
            warn!(
                target: "facelock::enroll",
                index,
                expected = dimension,
                found = embedding.len(),
                "skipping sample with mismatched dimensionality"
            );
            continue;
        }
        for (sum, value) in sums.iter_mut().zip(embedding.as_slice()) {
            *sum += f64::from(*value);
        }
        used += 1;
    }

    let mean = sums
        .into_iter()
        .map(|sum| (sum / used as f64) as f32)
        .collect();
    Some((Embedding::new(mean), used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::extractor::FALLBACK_DIMENSION;
    use base64::{engine::general_purpose, Engine as _};
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_payload(shade: u8) -> String {
        let image = RgbImage::from_fn(40, 40, |x, _| Rgb([shade, (x * 6) as u8, 200]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(bytes.into_inner())
        )
    }

    #[test]
    fn failed_samples_are_discarded() {
        let extractor = EmbeddingExtractor::fallback_only();
        let samples = vec![png_payload(10), "not-an-image".to_string(), png_payload(90)];
        let aggregated = aggregate(&extractor, &samples).unwrap();
        assert_eq!(aggregated.sample_count, 2);
        assert_eq!(aggregated.submitted, 3);
        assert_eq!(aggregated.embedding.len(), FALLBACK_DIMENSION);
    }

    #[test]
    fn all_failed_samples_is_an_error() {
        let extractor = EmbeddingExtractor::fallback_only();
        let err = aggregate(&extractor, &["", "garbage"]).unwrap_err();
        assert!(matches!(err, AppError::NoUsableSamples { submitted: 2 }));

        let none: [&str; 0] = [];
        assert!(aggregate(&extractor, &none).is_err());
    }

    #[test]
    fn mean_is_element_wise() {
        let (mean, used) = mean_embedding(&[
            Embedding::new(vec![1.0, 2.0, 3.0]),
            Embedding::new(vec![3.0, 4.0, 5.0]),
        ])
        .unwrap();
        assert_eq!(used, 2);
        assert_eq!(mean.as_slice(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn mismatched_dimension_is_skipped() {
        let (mean, used) = mean_embedding(&[
            Embedding::new(vec![1.0, 1.0]),
            Embedding::new(vec![5.0]),
            Embedding::new(vec![3.0, 3.0]),
        ])
        .unwrap();
        assert_eq!(used, 2);
        assert_eq!(mean.as_slice(), &[2.0, 2.0]);
    }
}
