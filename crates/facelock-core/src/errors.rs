use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input file not found or unreadable: {path}")]
    MissingInput { path: PathBuf },

    #[error("failed to read input {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no face embedding could be extracted from {path}")]
    NoEmbedding { path: PathBuf },

    #[error("none of the {submitted} enrollment sample(s) produced an embedding")]
    NoUsableSamples { submitted: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("missing {kind} model; provide {flag} or set ${env}")]
    MissingModel {
        kind: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("failed to write {path}: {source}")]
    FeatureWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    FeatureRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("facial profile {path} is invalid: {message}")]
    InvalidProfile { path: PathBuf, message: String },

    #[error("position payload {path} is invalid: {message}")]
    InvalidPosition { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::MissingInput { .. } => ExitCode::from(4),
            AppError::InputRead { .. } => ExitCode::from(2),
            AppError::MissingModel { .. } => ExitCode::from(2),
            AppError::ModelLoad { .. } => ExitCode::from(2),
            AppError::FeatureRead { .. } => ExitCode::from(2),
            AppError::InvalidProfile { .. } => ExitCode::from(2),
            AppError::InvalidPosition { .. } => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::NoEmbedding { .. } => ExitCode::from(3),
            AppError::NoUsableSamples { .. } => ExitCode::from(3),
            _ => ExitCode::from(1),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_cause() {
        let missing = AppError::MissingInput {
            path: PathBuf::from("live.png"),
        };
        assert_eq!(missing.exit_code(), ExitCode::from(4));

        let parse = AppError::ConfigParse {
            path: PathBuf::from("/etc/facelock/config.toml"),
            message: "expected a number".into(),
        };
        assert_eq!(parse.exit_code(), ExitCode::from(2));

        let unusable = AppError::NoUsableSamples { submitted: 3 };
        assert_eq!(unusable.exit_code(), ExitCode::from(3));
        assert_eq!(
            unusable.human_message(),
            "none of the 3 enrollment sample(s) produced an embedding"
        );
    }
}
