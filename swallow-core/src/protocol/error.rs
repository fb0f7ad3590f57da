/// A frame that must be discarded before any field is decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("bad length: expected {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
    #[error("bad header: expected {expected}, got {actual}")]
    BadHeader { expected: String, actual: String },
    #[error("checksum mismatch: frame carries 0x{carried:04x}, computed 0x{computed:04x}")]
    ChecksumMismatch { carried: u16, computed: u16 },
}

/// Malformed hex input or a field that does not fit the payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty hex input")]
    Empty,
    #[error("odd number of hex digits: {0}")]
    OddLength(usize),
    #[error("invalid hex digit {digit:?} at position {position}")]
    InvalidDigit { digit: char, position: usize },
    #[error("expected {expected} hex digits, got {actual}")]
    WrongWidth { expected: usize, actual: usize },
    #[error("{digits} hex digits do not fit in 64 bits")]
    TooWide { digits: usize },
    #[error("field {field} at bytes {offset}..{end} lies outside the {len}-byte payload")]
    OutOfRange {
        field: &'static str,
        offset: usize,
        end: usize,
        len: usize,
    },
    #[error("field {field} value {value} does not fit its type")]
    Overflow { field: &'static str, value: u64 },
}
