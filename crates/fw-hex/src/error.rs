use thiserror::Error;

/// Errors raised while decoding an Intel HEX or MPLAB table image.
///
/// Every variant carries enough context to report the offending line without
/// re-parsing it, so callers never have to fall back to a bare string.
#[derive(Debug, Error)]
pub enum HexError {
    #[error("line {line}: record does not start with ':'")]
    MissingColon { line: usize },

    #[error("line {line}: record too short to contain length/address/type")]
    RecordTooShort { line: usize },

    #[error("line {line}: odd number of hex digits in record body")]
    OddDigitCount { line: usize },

    #[error("line {line}: invalid hex digit")]
    InvalidHexDigit { line: usize },

    #[error("line {line}: checksum mismatch (expected {expected:#04X}, calculated {calculated:#04X})")]
    BadChecksum {
        line: usize,
        expected: u8,
        calculated: u8,
    },

    #[error("line {line}: payload shorter than declared record length")]
    ShortPayload { line: usize },

    #[error("mplab table: address field is not a 6-digit hex value on line {line}")]
    BadMplabAddress { line: usize },

    #[error("failed to read image file")]
    Io(#[from] std::io::Error),
}
