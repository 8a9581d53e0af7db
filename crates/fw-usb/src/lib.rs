//! # fw-usb: framed USB transport
//!
//! Wraps a single USB interrupt endpoint pair behind the [`UsbChannel`]
//! trait, and provides the retry decorator ([`retrying`]) that the
//! bootloader protocol layer applies to retriable commands.
//!
//! The vendor/product id pair and the `(0, 0)` interface are fixed by the
//! target bootloader family (see [`VENDOR_ID`], [`PRODUCT_ID`]); everything
//! else about a connection — timeouts, retry counts — is threaded down by
//! value from the caller rather than read from module-level globals.

mod channel;
mod error;
mod retry;
mod rusb_channel;

pub use channel::UsbChannel;
pub use error::UsbError;
pub use retry::retrying;
pub use rusb_channel::RusbChannel;

/// USB vendor id for this bootloader family.
pub const VENDOR_ID: u16 = 0x04D8;
/// USB product id for this bootloader family.
pub const PRODUCT_ID: u16 = 0xE89B;

/// All bootloader responses are read as 64-byte interrupt transfers;
/// callers slice off the bytes they care about.
pub const RESPONSE_FRAME_LEN: usize = 64;

/// A thin, channel-agnostic transport used by `fw-protocol`.
///
/// This exists mainly so protocol code depends on a concrete, non-generic
/// type (`UsbTransport`) while still being testable — construct it with
/// [`RusbChannel`] for real hardware, or with any other [`UsbChannel`]
/// implementation in tests.
pub struct UsbTransport {
    channel: Box<dyn UsbChannel + Send>,
}

impl UsbTransport {
    pub fn new(channel: Box<dyn UsbChannel + Send>) -> Self {
        Self { channel }
    }

    pub fn open(vendor: u16, product: u16) -> Result<Self, UsbError> {
        Ok(Self::new(Box::new(RusbChannel::open(vendor, product)?)))
    }

    pub fn write(&mut self, data: &[u8], timeout: std::time::Duration) -> Result<(), UsbError> {
        self.channel.write(data, timeout)
    }

    pub fn read(
        &mut self,
        len: usize,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, UsbError> {
        self.channel.read(len, timeout)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// An in-memory channel driven by a scripted queue of expected
    /// writes and canned reads, used by `fw-protocol`/`fw-loader` tests.
    #[derive(Default)]
    pub struct MockChannel {
        pub writes: Vec<Vec<u8>>,
        pub reads: VecDeque<Vec<u8>>,
    }

    impl MockChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_read(&mut self, data: Vec<u8>) {
            self.reads.push_back(data);
        }
    }

    impl UsbChannel for MockChannel {
        fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<(), UsbError> {
            self.writes.push(data.to_vec());
            Ok(())
        }

        fn read(&mut self, len: usize, _timeout: Duration) -> Result<Vec<u8>, UsbError> {
            let mut data = self
                .reads
                .pop_front()
                .ok_or_else(|| UsbError::Io("no scripted read available".into()))?;
            data.resize(len, 0);
            Ok(data)
        }
    }
}
