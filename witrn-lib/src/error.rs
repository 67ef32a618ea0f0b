use thiserror::Error;

/// Frame-level errors. A frame that fails here is rejected as a whole and no
/// tree is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Empty input: no frame bytes to decode")]
    EmptyInput,

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Hex payload length must be even, got {0} digits")]
    OddHexLength(usize),

    #[error("Invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Unrecognized frame marker 0x{0:02X}: expected 0xFF (general) or 0xFE (PD)")]
    UnknownMarker(u8),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Invalid frame length: expected exactly {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Field-level errors. These never abort a decode; they are embedded in the
/// tree as [`Scalar::Malformed`](crate::metadata::Scalar::Malformed).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("bits {start}..={end} exceed the {available}-byte buffer")]
    OutOfRange { start: usize, end: usize, available: usize },

    #[error("unsupported field width {0} (1..=64 bits)")]
    Width(u32),

    #[error("{what}: needs {declared} bytes, {available} available")]
    Truncated {
        what: &'static str,
        declared: usize,
        available: usize,
    },

    #[error("{0} has no decodable fields")]
    Empty(&'static str),
}
