use std::time::Duration;
use thiserror::Error;

/// Failures from driving a single board through the erase/program/verify/
/// seal state machine.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Usb(#[from] fw_usb::UsbError),

    #[error(transparent)]
    Protocol(#[from] fw_protocol::ProtocolError),

    #[error("no device enumerated for vendor={vendor:#06X} product={product:#06X} after polling {elapsed:?}")]
    EnumerationTimeout {
        vendor: u16,
        product: u16,
        elapsed: Duration,
    },

    #[error("operation requires the loader to be {expected}, but it is {actual}")]
    WrongState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("programming failed between positions {start} and {end}")]
    ProgramFailed {
        start: usize,
        end: usize,
        #[source]
        source: fw_protocol::ProtocolError,
    },

    #[error("verify failed between positions {start} and {end}")]
    VerifyMismatch { start: usize, end: usize },

    #[error("image covers {have} bytes, need at least {need} for the advertised memory window")]
    SizeMismatch { have: usize, need: usize },

    #[error("device-reported digest {device:#06X} does not match recomputed digest {computed:#06X}")]
    DigestMismatch { device: u16, computed: u16 },

    #[error("serial pre-stage failed: {0}")]
    PreStage(String),
}
