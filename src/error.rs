//! Error types for the capture-and-export pipeline
//!
//! Only [`Error::EmptyBatchError`] and [`Error::SubmissionError`] ever escape
//! [`crate::Exporter::export_all`]. The per-image and per-slide variants are
//! produced by individual fallback tiers and absorbed by the next tier.

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing and exporting slides
#[derive(Error, Debug)]
pub enum Error {
    /// A single relay (or direct) fetch of an image failed
    #[error("Image fetch failed via {via}: {reason}")]
    ImageFetchError { via: String, reason: String },

    /// The image host did not allow a cross-origin read of the pixels
    #[error("Canvas tainted by cross-origin image: {0}")]
    CanvasTaintError(String),

    /// Rasterizing a slide subtree failed for one encoding
    #[error("Slide capture failed: {0}")]
    SlideCaptureError(String),

    /// No slide root element was found in the document
    #[error("No slides captured")]
    EmptyBatchError,

    /// The assembly service was unreachable or rejected the batch
    #[error("Presentation submission failed: {0}")]
    SubmissionError(String),

    /// Failed to initialize the exporter
    #[error("Exporter initialization failed: {0}")]
    InitializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Malformed input (HTML, data URI, slide list)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Network error outside of the submission step
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Failed to render or encode an image
    #[error("Rendering failed: {0}")]
    RenderError(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::RenderError(err.to_string())
    }
}

impl Error {
    /// Whether this error aborts an export run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::EmptyBatchError | Error::SubmissionError(_))
    }
}
