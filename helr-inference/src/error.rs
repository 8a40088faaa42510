use helr_ckks::HeError;
use thiserror::Error;

/// Failures of the loading, packing and inference pipeline. All are fatal
/// for the command-line tool.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("buffer holds {actual} elements, shape needs {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("index has {actual} dimensions, array has {expected}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("index out of bounds: {index} >= {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    #[error("bad magic number {0:#06x} in IDX header")]
    BadMagic(u16),

    #[error("unsupported IDX element type {0:#04x}")]
    UnsupportedElementType(u8),

    #[error("truncated read: expected {expected} bytes, got {actual}")]
    TruncatedRead { expected: usize, actual: usize },

    #[error("multiplicative depth exceeded: need {required}, configured {available}")]
    DepthExceeded { required: usize, available: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("decryption of the {0} result reported failure")]
    DecryptionInvalid(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("HE backend: {0}")]
    Backend(#[source] HeError),
}

impl From<HeError> for InferenceError {
    fn from(err: HeError) -> Self {
        match err {
            HeError::DepthExceeded {
                required,
                available,
            } => InferenceError::DepthExceeded {
                required,
                available,
            },
            other => InferenceError::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;
