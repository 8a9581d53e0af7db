use std::time::{Duration, Instant};

use fw_hex::DenseImage;
use fw_protocol::{BootloaderClient, ProtocolError, QueryResponse, BYTES_PER_PACKET, DEFAULT_DEVICE_ID};
use fw_usb::UsbTransport;

use crate::digest::digest;
use crate::error::LoaderError;
use crate::state::{ConnectConfig, ConnectMode, LoaderState};

/// Delay `seal()` waits before re-QUERYing the device to read back its
/// digest, so the bootloader has time to finish committing it.
const POST_SEAL_SETTLE: Duration = Duration::from_secs(1);

/// Drives a single board through connect → erase → program → verify →
/// seal → jump/reset/disconnect.
///
/// The serial pre-stage (used by [`ConnectMode::Serial`]) is supplied by the
/// caller as a closure rather than a direct dependency on `fw-serial` — this
/// crate only needs to know "try this if USB enumeration fails", not how the
/// RS-232/485 handshake works.
pub struct FirmwareLoader {
    config: ConnectConfig,
    client: Option<BootloaderClient>,
    state: LoaderState,
    /// The device id this loader was last `connect()`ed to; QUERY is the
    /// only request that carries it, but every resync QUERY (erase, verify,
    /// seal) must keep targeting the same board.
    device_id: u8,
    /// Bytes written by the last `program()` call, kept so `seal()` can
    /// digest exactly what was sent without re-reading the device.
    written: Option<Vec<u8>>,
}

impl FirmwareLoader {
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            config,
            client: None,
            state: LoaderState::Disconnected,
            device_id: DEFAULT_DEVICE_ID,
            written: None,
        }
    }

    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    fn open_once(&self) -> Result<UsbTransport, LoaderError> {
        Ok(UsbTransport::open(self.config.vendor_id, self.config.product_id)?)
    }

    fn open_polling(&self) -> Result<UsbTransport, LoaderError> {
        let start = Instant::now();
        loop {
            match self.open_once() {
                Ok(t) => return Ok(t),
                Err(_) if start.elapsed() < self.config.polling_timeout => {
                    std::thread::sleep(self.config.polling_interval);
                }
                Err(_) => {
                    return Err(LoaderError::EnumerationTimeout {
                        vendor: self.config.vendor_id,
                        product: self.config.product_id,
                        elapsed: start.elapsed(),
                    })
                }
            }
        }
    }

    /// Locate the board addressed as `device_id` and issue the initial
    /// QUERY sequence. `prestage`, when given, runs once if plain USB
    /// enumeration fails under [`ConnectMode::Serial`]; enumeration is
    /// retried once afterward.
    ///
    /// Before targeting `device_id`, issues `QUERY(altDeviceId=0)` — the
    /// routing invariant that stops the bootloader auto-jumping to the
    /// application before any state-changing sequence — then `QUERY(device_id)`
    /// and asserts the two reported the same memory window.
    pub fn connect(
        &mut self,
        device_id: u8,
        mode: ConnectMode,
        mut prestage: Option<&mut dyn FnMut() -> Result<(), LoaderError>>,
    ) -> Result<&QueryResponse, LoaderError> {
        let transport = match mode {
            ConnectMode::Simple => self.open_once()?,
            ConnectMode::Polling => self.open_polling()?,
            ConnectMode::Serial => match self.open_once() {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("USB enumeration failed ({e}), running serial pre-stage");
                    if let Some(f) = prestage.as_deref_mut() {
                        f()?;
                    }
                    self.open_once()?
                }
            },
        };

        let mut client = BootloaderClient::new(
            transport,
            self.config.cmd_retries,
            self.config.response_timeout,
            self.config.erase_timeout,
        );

        let anti_jump = client.query(Some(0))?;
        let query = client.query(Some(device_id))?;
        if query.start_addr != anti_jump.start_addr || query.length_words != anti_jump.length_words {
            return Err(LoaderError::Protocol(ProtocolError::Violation(format!(
                "device descriptor changed between QUERY(0) and QUERY({device_id}): \
                 start_addr {:#08X}/{:#08X}, length_words {:#X}/{:#X}",
                anti_jump.start_addr, query.start_addr, anti_jump.length_words, query.length_words
            ))));
        }

        log::info!(
            "connected to device {device_id:#04X}: start_addr={:#08X} length_words={:#X} boot_version={:?}",
            query.start_addr,
            query.length_words,
            query.boot_version
        );
        self.client = Some(client);
        self.device_id = device_id;
        self.state = LoaderState::Connected { query };
        Ok(self.state.query().expect("just set"))
    }

    pub fn erase(&mut self) -> Result<&QueryResponse, LoaderError> {
        let LoaderState::Connected { .. } = &self.state else {
            return Err(LoaderError::WrongState {
                expected: "connected",
                actual: self.state.label(),
            });
        };
        let device_id = self.device_id;
        let client = self.client.as_mut().expect("connected implies a client");
        // Stop the bootloader auto-jumping to the application before this
        // state-changing sequence.
        client.query(Some(0))?;
        let query = client.erase(Some(device_id))?;
        log::info!("erase complete, board resynchronized");
        self.state = LoaderState::Erased { query };
        Ok(self.state.query().expect("just set"))
    }

    pub fn program(&mut self, image: &DenseImage) -> Result<(), LoaderError> {
        let query = match &self.state {
            LoaderState::Erased { query } => query.clone(),
            _ => {
                return Err(LoaderError::WrongState {
                    expected: "erased",
                    actual: self.state.label(),
                })
            }
        };

        let range = DenseImage::window_range(query.start_addr, query.length_words);
        if image.len() < range.end {
            return Err(LoaderError::SizeMismatch {
                have: image.len(),
                need: range.end,
            });
        }

        self.state = LoaderState::Programming {
            query: query.clone(),
        };

        let window = &image[range.clone()];
        let client = self.client.as_mut().expect("connected implies a client");

        let mut pos = 0usize;
        while pos < window.len() {
            let end = (pos + BYTES_PER_PACKET).min(window.len());
            let chunk = &window[pos..end];
            let addr_word = query.start_addr + (pos / 2) as u32;
            client
                .program(addr_word, chunk)
                .map_err(|source| LoaderError::ProgramFailed {
                    start: range.start + pos,
                    end: range.start + end,
                    source,
                })?;
            pos = end;
        }

        self.written = Some(window.to_vec());
        self.state = LoaderState::ProgrammedUnsealed { query };
        Ok(())
    }

    /// Re-walks the memory window with GET_DATA, comparing each chunk
    /// against `image`. When `check_digest` and the device reports
    /// `proto_ver >= 1`, also re-QUERYs and compares the device-reported
    /// digest against the CRC-16/CCITT of the same window.
    pub fn verify(&mut self, image: &DenseImage, check_digest: bool) -> Result<(), LoaderError> {
        let query = self.state.query().cloned().ok_or(LoaderError::WrongState {
            expected: "connected, erased, programmed, or sealed",
            actual: self.state.label(),
        })?;
        let device_id = self.device_id;
        let client = self.client.as_mut().expect("connected implies a client");

        let range = DenseImage::window_range(query.start_addr, query.length_words);
        if image.len() < range.end {
            return Err(LoaderError::SizeMismatch {
                have: image.len(),
                need: range.end,
            });
        }
        let expected = &image[range.clone()];

        let mut pos = 0usize;
        while pos < expected.len() {
            let end = (pos + BYTES_PER_PACKET).min(expected.len());
            let len = (end - pos) as u8;
            let addr_word = query.start_addr + (pos / 2) as u32;
            let actual = client.get_data(addr_word, len)?;
            if actual != expected[pos..end] {
                return Err(LoaderError::VerifyMismatch {
                    start: range.start + pos,
                    end: range.start + end,
                });
            }
            pos = end;
        }

        if check_digest && query.proto_ver >= 1 {
            let computed = digest(expected);
            let requery = client.query(Some(device_id))?;
            let device_digest = requery.digest.unwrap_or(0);
            if device_digest != computed {
                return Err(LoaderError::DigestMismatch {
                    device: device_digest,
                    computed,
                });
            }
        }

        log::info!("verify passed over {} bytes", expected.len());
        Ok(())
    }

    /// Sends `PROGRAM_COMPLETE(digest)`. On `proto_ver >= 1`, waits briefly
    /// and re-QUERYs, failing with [`LoaderError::DigestMismatch`] if the
    /// device's reported digest doesn't match what was just sent.
    pub fn seal(&mut self) -> Result<(), LoaderError> {
        let query = match &self.state {
            LoaderState::ProgrammedUnsealed { query } => query.clone(),
            _ => {
                return Err(LoaderError::WrongState {
                    expected: "programmed (unsealed)",
                    actual: self.state.label(),
                })
            }
        };
        let written = self
            .written
            .as_deref()
            .expect("ProgrammedUnsealed implies program() populated `written`");
        let crc = digest(written);
        let device_id = self.device_id;
        let client = self.client.as_mut().expect("connected implies a client");
        client.program_complete(crc)?;

        let sealed_query = if query.proto_ver >= 1 {
            std::thread::sleep(POST_SEAL_SETTLE);
            let requery = client.query(Some(device_id))?;
            let device_digest = requery.digest.unwrap_or(0);
            if device_digest != crc {
                return Err(LoaderError::DigestMismatch {
                    device: device_digest,
                    computed: crc,
                });
            }
            requery
        } else {
            query
        };

        log::info!("sealed with digest {crc:#06X}");
        self.state = LoaderState::Sealed { query: sealed_query };
        Ok(())
    }

    pub fn jump(&mut self) -> Result<(), LoaderError> {
        let client = self.client.as_mut().ok_or(LoaderError::WrongState {
            expected: "connected",
            actual: self.state.label(),
        })?;
        client.jump_to_application()?;
        self.state = LoaderState::Jumped;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), LoaderError> {
        let client = self.client.as_mut().ok_or(LoaderError::WrongState {
            expected: "connected",
            actual: self.state.label(),
        })?;
        client.reset_boot_mmt()?;
        self.state = LoaderState::Reset;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.client = None;
        self.device_id = DEFAULT_DEVICE_ID;
        self.written = None;
        self.state = LoaderState::Disconnected;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FirmwareLoader {
    /// Build a loader already past `connect()`, wired to a pre-built
    /// client (a mock channel in tests) and addressed as `device_id`. Lets
    /// tests exercise erase/program/verify/seal without a real USB device.
    pub fn from_client(
        config: ConnectConfig,
        client: BootloaderClient,
        device_id: u8,
        state: LoaderState,
    ) -> Self {
        Self {
            config,
            client: Some(client),
            device_id,
            state,
            written: None,
        }
    }
}
