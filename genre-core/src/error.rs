use thiserror::Error;

/// All errors produced by genre-core.
#[derive(Debug, Error)]
pub enum GenreError {
    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("audio contains no samples")]
    EmptyAudio,

    #[error("feature extraction error: {0}")]
    FeatureExtraction(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {}", path.display())]
    ModelNotFound { path: std::path::PathBuf },

    #[error("unknown genre label: {0}")]
    UnknownLabel(String),

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GenreError>;
