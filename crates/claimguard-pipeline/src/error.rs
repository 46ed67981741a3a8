use claimguard_core::ClaimError;
use claimguard_frame::FrameError;
use thiserror::Error;

/// Errors raised while configuring or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Model(#[from] ClaimError),

    #[error("Invalid TOML in {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration `{field}`: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("No input data: set `data.path` or pass --data")]
    MissingDataPath,

    #[error("Target column `{0}` not found")]
    MissingTarget(String),

    #[error("Unknown model `{0}`")]
    UnknownModel(String),

    #[error("{model} failed: {source}")]
    ModelFailed {
        model: String,
        #[source]
        source: ClaimError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
