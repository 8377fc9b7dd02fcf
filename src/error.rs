use std::io;
use thiserror::Error;

/// Errors raised at component boundaries of the overlay engine.
///
/// Only the pipeline turns these into "skip and log"; every other component
/// hands them back to its caller.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Every candidate and fallback font failed to resolve.
    #[error("no usable font found for '{font}'")]
    FontNotFound { font: String },

    /// The translation request could not produce text.
    #[error("translation failed: {0}")]
    TranslationFailed(String),

    /// Font loading, measuring or rasterizing a block failed.
    #[error("render failed: {0}")]
    RenderFailed(String),

    /// The OCR result for a page could not be read.
    #[error("invalid OCR result: {0}")]
    InvalidOcr(String),

    #[error("unknown language code '{0}'")]
    UnknownLanguage(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
