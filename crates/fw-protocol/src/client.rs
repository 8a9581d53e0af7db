use std::time::Duration;

use fw_usb::{retrying, UsbTransport, RESPONSE_FRAME_LEN};

use crate::command::Command;
use crate::error::ProtocolError;
use crate::response::{decode_boot_fw_version_response, decode_get_data_response, decode_query_response, QueryResponse};

/// Device id used for a QUERY that targets "whichever board answers first"
/// rather than a specific slave on the bus.
pub const DEFAULT_DEVICE_ID: u8 = 0xFF;

/// ERASE has no response of its own; the bootloader needs this long to
/// finish erasing program memory before it will answer a follow-up QUERY.
pub const MIN_ERASE_TIMEOUT: Duration = Duration::from_millis(5000);

/// High-level view of the bootloader command set over a [`UsbTransport`].
///
/// Retries are applied per [`Command::is_retriable`]; PROGRAM and GET_DATA
/// always run exactly once so a real failure surfaces to the caller instead
/// of being silently masked by a retry.
pub struct BootloaderClient {
    transport: UsbTransport,
    cmd_retries: u32,
    response_timeout: Duration,
    erase_timeout: Duration,
}

impl BootloaderClient {
    pub fn new(
        transport: UsbTransport,
        cmd_retries: u32,
        response_timeout: Duration,
        erase_timeout: Duration,
    ) -> Self {
        let erase_timeout = erase_timeout.max(MIN_ERASE_TIMEOUT);
        Self {
            transport,
            cmd_retries,
            response_timeout,
            erase_timeout,
        }
    }

    fn execute(&mut self, cmd: &Command, timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        let frame = cmd.encode()?;
        let expects_response = cmd.expects_response();
        let retries = if cmd.is_retriable() { self.cmd_retries } else { 0 };
        let transport = &mut self.transport;

        let response = retrying(retries, || {
            transport.write(&frame, timeout)?;
            if expects_response {
                transport.read(RESPONSE_FRAME_LEN, timeout)
            } else {
                Ok(Vec::new())
            }
        })?;

        Ok(response)
    }

    /// Query a board. `alt_device_id` routes to one specific device on a
    /// shared bus; `None` queries whichever board is listening, which is
    /// also what a bare `query_after_erase` resynchronization does.
    pub fn query(&mut self, alt_device_id: Option<u8>) -> Result<QueryResponse, ProtocolError> {
        let device_id = alt_device_id.unwrap_or(DEFAULT_DEVICE_ID);
        let raw = self.execute(&Command::Query { device_id }, self.response_timeout)?;
        decode_query_response(&raw)
    }

    /// Erase program memory, then resynchronize with a QUERY under the long
    /// erase timeout. The returned `QueryResponse` confirms the board came
    /// back in a state ready to be programmed.
    pub fn erase(&mut self, device_id: Option<u8>) -> Result<QueryResponse, ProtocolError> {
        self.execute(&Command::Erase, self.response_timeout)?;
        let id = device_id.unwrap_or(DEFAULT_DEVICE_ID);
        let raw = self.execute(&Command::Query { device_id: id }, self.erase_timeout)?;
        decode_query_response(&raw)
    }

    pub fn program(&mut self, addr: u32, chunk: &[u8]) -> Result<(), ProtocolError> {
        self.execute(
            &Command::Program {
                addr,
                chunk: chunk.to_vec(),
            },
            self.response_timeout,
        )?;
        Ok(())
    }

    pub fn program_complete(&mut self, digest: u16) -> Result<(), ProtocolError> {
        self.execute(&Command::ProgramComplete { digest }, self.response_timeout)?;
        Ok(())
    }

    pub fn get_data(&mut self, addr: u32, length: u8) -> Result<Vec<u8>, ProtocolError> {
        let raw = self.execute(&Command::GetData { addr, length }, self.response_timeout)?;
        decode_get_data_response(&raw)
    }

    pub fn jump_to_application(&mut self) -> Result<(), ProtocolError> {
        self.execute(&Command::JumpToApplication, self.response_timeout)?;
        Ok(())
    }

    pub fn boot_fw_version(&mut self, device_id: u8) -> Result<(u8, u8, u8), ProtocolError> {
        let raw = self.execute(
            &Command::BootFwVersionRequest { device_id },
            self.response_timeout,
        )?;
        decode_boot_fw_version_response(&raw)
    }

    pub fn reset_boot_mmt(&mut self) -> Result<(), ProtocolError> {
        self.execute(&Command::ResetBootMmt, self.response_timeout)?;
        Ok(())
    }
}
