use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause carried by [`CodecError::Inference`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the pipeline can fail with. None of these are fatal; the caller
/// decides whether to surface them or retry with different input.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The image is missing, empty or could not be decoded.
    #[error("invalid image: {message}")]
    InvalidImage { message: String },

    /// The tensor spec cannot be satisfied by this pipeline or this model.
    #[error("unsupported tensor spec: {message}")]
    UnsupportedSpec { message: String },

    /// A tensor's element count or batch disagrees with what it is paired with.
    #[error("shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("label table is empty")]
    EmptyLabels,

    /// The inference backend failed. The cause is opaque to the pipeline.
    #[error("inference failed: {0}")]
    Inference(#[source] BoxError),

    #[error("failed to read labels from '{}'", path.display())]
    LabelFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration: {message}")]
    Config { message: String },
}

impl CodecError {
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedSpec {
            message: message.into(),
        }
    }

    pub fn inference(cause: impl Into<BoxError>) -> Self {
        Self::Inference(cause.into())
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Inference(_))
    }
}
