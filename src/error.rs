use std::io;

/// Result type for metastrip operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller by the processing pipeline.
///
/// Extraction never produces these — unreadable metadata is reported as an
/// empty [`MetadataSummary`](crate::summary::MetadataSummary). Removal on the
/// selective JPEG path degrades internal failures to "return the original
/// bytes"; the variants below are the ones that cannot be degraded safely.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Declared type/container is not in the supported set.
    #[error("Unsupported format: {mime}")]
    UnsupportedFormat { mime: String },

    /// Video input exceeds the configured size ceiling.
    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    /// Underlying codec or transcode failure (corrupt input, engine crash).
    #[error("Processing failed: {0}")]
    Processing(String),

    /// The external media engine could not be initialized. The memoized
    /// handle is left unset, so a later call retries a fresh load.
    #[error("Failed to load media engine: {0}")]
    EngineLoad(String),

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Processing(err.to_string())
    }
}
