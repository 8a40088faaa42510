use thiserror::Error;

/// Failures raised by a homomorphic-encryption backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeError {
    #[error("multiplicative depth exceeded: operation needs level {required}, budget is {available}")]
    DepthExceeded { required: usize, available: usize },

    #[error("no rotation key generated for offset {0}")]
    MissingRotationKey(i32),

    #[error("too many values for the slot vector: {len} > {slots}")]
    SlotOverflow { len: usize, slots: usize },

    #[error("ciphertext scales differ beyond tolerance: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("summation run of {run} slots is not a power of two dividing {slots}")]
    RunLength { run: usize, slots: usize },

    #[error("value does not fit the fixed-point encoding at scale 2^{scale_bits}")]
    EncodingOverflow { scale_bits: u32 },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

pub type Result<T> = std::result::Result<T, HeError>;
