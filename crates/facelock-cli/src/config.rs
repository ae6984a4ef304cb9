use std::path::PathBuf;

use facelock_config::{self as config_file, ConfigError, ResolvedConfig};
use facelock_core::faces::EmbeddingExtractor;

use crate::cli::EncoderArgs;
use crate::errors::{AppError, AppResult};

pub fn load_resolved() -> AppResult<ResolvedConfig> {
    load_resolved_with_sources(&config_file::default_sources())
}

pub fn load_resolved_with_sources(sources: &[PathBuf]) -> AppResult<ResolvedConfig> {
    let loaded = config_file::load_resolved_from_paths(sources).map_err(map_config_error)?;
    match &loaded.source {
        Some(path) => tracing::debug!(path = %path.display(), "loaded configuration"),
        None => tracing::debug!("no configuration file found; using built-in defaults"),
    }
    Ok(loaded.resolved)
}

fn map_config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
    }
}

/// Builds the extractor the configuration asks for.
///
/// With the `dlib` feature the encoder is loaded when model paths resolve;
/// otherwise the fingerprint fallback is used unless `require_encoder` is set.
pub fn build_extractor(config: &ResolvedConfig, args: &EncoderArgs) -> AppResult<EmbeddingExtractor> {
    let extractor = load_encoder(config, args)?;
    Ok(extractor.require_encoder(config.require_encoder))
}

#[cfg(feature = "dlib")]
fn load_encoder(config: &ResolvedConfig, args: &EncoderArgs) -> AppResult<EmbeddingExtractor> {
    use facelock_core::faces::{
        DlibEncoder, EncoderModelConfig, EnvModelPathResolver, ModelPathResolver,
    };

    let model_config = EncoderModelConfig {
        landmark_model: args
            .landmark_model
            .clone()
            .or_else(|| config.landmark_model.clone()),
        encoder_model: args
            .encoder_model
            .clone()
            .or_else(|| config.encoder_model.clone()),
        jitters: args.jitters.unwrap_or(config.jitters).max(1),
    };

    match EnvModelPathResolver.resolve(&model_config) {
        Ok(models) => {
            let encoder = DlibEncoder::new(&models, model_config.jitters)?;
            Ok(EmbeddingExtractor::with_encoder(encoder))
        }
        Err(err) if !config.require_encoder => {
            tracing::warn!("{err}; using the fingerprint fallback");
            Ok(EmbeddingExtractor::fallback_only())
        }
        Err(err) => Err(err),
    }
}

#[cfg(not(feature = "dlib"))]
fn load_encoder(_config: &ResolvedConfig, args: &EncoderArgs) -> AppResult<EmbeddingExtractor> {
    if args.landmark_model.is_some() || args.encoder_model.is_some() {
        tracing::warn!("built without the dlib feature; ignoring model paths");
    }
    Ok(EmbeddingExtractor::fallback_only())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_without_sources() {
        let resolved = load_resolved_with_sources(&[]).unwrap();
        assert_eq!(resolved.gallery_tolerance, config_file::DEFAULT_GALLERY_TOLERANCE);
    }

    #[test]
    fn parse_errors_map_to_app_errors() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("config.toml");
        fs::write(&broken, "jitters = \"many\"").unwrap();

        let err = load_resolved_with_sources(&[broken.clone()]).unwrap_err();
        match err {
            AppError::ConfigParse { path, .. } => assert_eq!(path, broken),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(not(feature = "dlib"))]
    #[test]
    fn fallback_extractor_without_dlib() {
        let config = ResolvedConfig::default();
        let extractor = build_extractor(&config, &EncoderArgs::default()).unwrap();
        assert!(!extractor.has_encoder());
    }
}
