use std::time::Duration;

use crate::error::UsbError;

/// A bidirectional byte channel to a single USB interrupt endpoint pair.
///
/// Implemented for real hardware by [`crate::rusb_channel::RusbChannel`] and,
/// in tests, by small in-memory fakes that script expected writes/reads —
/// this is the seam `fw-protocol` is built against so it never needs a real
/// device to exercise command encoding/decoding.
pub trait UsbChannel {
    /// Write `data` to the OUT endpoint. A short write (fewer bytes written
    /// than requested) is always fatal, never retried at this layer.
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<(), UsbError>;

    /// Block for up to `len` bytes from the IN endpoint. Callers must not
    /// invoke this for commands that produce no response.
    fn read(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, UsbError>;
}
