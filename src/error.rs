use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures surfaced by the detection and scoring engine.
///
/// A 0% adherence score is never reported through this type: an empty
/// planogram is a valid comparison with a score of zero.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid detection: {0}")]
    InvalidDetection(String),

    #[error("detection model unavailable ({model})")]
    ModelUnavailable {
        model: String,
        #[source]
        source: BoxError,
    },

    #[error("detection failed for {image}")]
    DetectionFailed {
        image: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to write debug output {}", .path.display())]
    DebugOutput {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl EngineError {
    pub(crate) fn model_unavailable(model: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            source: source.into(),
        }
    }

    pub(crate) fn detection_failed(image: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::DetectionFailed {
            image: image.into(),
            source: source.into(),
        }
    }

    pub(crate) fn debug_output(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::DebugOutput {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
