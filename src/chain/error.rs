use thiserror::Error;

/// Errors raised while decoding loosely-typed chain primitives
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("big-integer compact mode not supported")]
    UnsupportedCompact,

    #[error("invalid data length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("malformed header extension: {0}")]
    Extension(String),

    #[error("{module}.{method}: metadata declares {names} args but call carries {values}")]
    ArgArity {
        module: String,
        method: String,
        names: usize,
        values: usize,
    },
}
