use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum YencError {
    #[error("missing {keyword} line")]
    MissingKeyword { keyword: &'static str },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("CRC32 mismatch at {scope:?}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        scope: CrcScope,
        expected: u32,
        actual: u32,
    },

    #[error("decoded {actual} bytes but the trailer declared {declared}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("decoded data exceeds the declared part size of {limit} bytes")]
    SizeOverflow { limit: u64 },

    #[error("input ended before the =yend trailer")]
    TruncatedInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcScope {
    Part,
    File,
}
