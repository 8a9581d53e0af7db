use thiserror::Error;

/// Bootloader protocol-level failures: either the transport failed, or a
/// response decoded but violated one of the command table's fixed-field
/// invariants.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Usb(#[from] fw_usb::UsbError),

    #[error("chunk of {0} bytes exceeds the 56-byte packet limit")]
    ChunkTooLarge(usize),

    #[error("response too short: got {got} bytes, need at least {need}")]
    ResponseTooShort { got: usize, need: usize },

    #[error("protocol violation: {0}")]
    Violation(String),
}
