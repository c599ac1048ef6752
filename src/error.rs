//! Error types for the scan pipeline.
//!
//! Every variant is recoverable at the attempt boundary: the controller logs it,
//! surfaces it as a status line and returns to `Ready` for the next tick.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Source or layout not ready (zero display size, guide box off-frame).
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Crop or normalization received a malformed region.
    #[error("processing error: {0}")]
    Processing(String),

    /// The OCR engine failed to start. Retried on the next eligible attempt.
    #[error("OCR engine failed to initialize: {0}")]
    EngineInit(String),

    /// The OCR engine call itself failed.
    #[error("recognition failed: {0}")]
    Recognition(String),

    #[error("unknown field '{key}' in template '{template}'")]
    UnknownField { template: String, key: String },

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// Frame could not be decoded from the source.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn engine_init(msg: impl Into<String>) -> Self {
        Self::EngineInit(msg.into())
    }

    pub fn recognition(msg: impl Into<String>) -> Self {
        Self::Recognition(msg.into())
    }
}
