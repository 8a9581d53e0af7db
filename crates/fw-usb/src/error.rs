use thiserror::Error;

/// Transport-level failures from the USB interrupt endpoint pair.
#[derive(Debug, Error)]
pub enum UsbError {
    #[error("no device found for vendor={vendor:#06X} product={product:#06X}")]
    NotFound { vendor: u16, product: u16 },

    #[error("failed to claim interface (0,0): {0}")]
    ClaimInterface(String),

    #[error("IN/OUT interrupt endpoints not found on interface (0,0)")]
    EndpointsNotFound,

    #[error("write returned {actual} bytes, expected {expected}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("USB I/O error: {0}")]
    Io(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
