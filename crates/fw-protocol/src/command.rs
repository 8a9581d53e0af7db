use crate::error::ProtocolError;

/// Password sent with every QUERY request, fixed by the bootloader.
pub const PASSWORD_QUERY: [u8; 8] = [0x82, 0x14, 0x2A, 0x5D, 0x6F, 0x9A, 0x25, 0x01];

/// Maximum payload bytes in one PROGRAM chunk / GET_DATA read.
pub const BYTES_PER_PACKET: usize = 56;

const CMD_QUERY: u8 = 0x02;
const CMD_ERASE: u8 = 0x04;
const CMD_PROGRAM: u8 = 0x05;
const CMD_PROGRAM_COMPLETE: u8 = 0x06;
const CMD_GET_DATA: u8 = 0x07;
const CMD_JUMP_TO_APPLICATION: u8 = 0x09;
const CMD_BOOT_FW_VERSION_REQUEST: u8 = 0x0A;
const CMD_RESET_BOOT_MMT: u8 = 0x0B;

/// One bootloader command, tagged by variant rather than encoded ad hoc at
/// each call site. Each variant knows its own wire encoding and whether the
/// USB retry decorator should be applied to it.
#[derive(Debug, Clone)]
pub enum Command {
    Query { device_id: u8 },
    Erase,
    Program { addr: u32, chunk: Vec<u8> },
    ProgramComplete { digest: u16 },
    GetData { addr: u32, length: u8 },
    JumpToApplication,
    BootFwVersionRequest { device_id: u8 },
    ResetBootMmt,
}

impl Command {
    pub fn cmd_id(&self) -> u8 {
        match self {
            Command::Query { .. } => CMD_QUERY,
            Command::Erase => CMD_ERASE,
            Command::Program { .. } => CMD_PROGRAM,
            Command::ProgramComplete { .. } => CMD_PROGRAM_COMPLETE,
            Command::GetData { .. } => CMD_GET_DATA,
            Command::JumpToApplication => CMD_JUMP_TO_APPLICATION,
            Command::BootFwVersionRequest { .. } => CMD_BOOT_FW_VERSION_REQUEST,
            Command::ResetBootMmt => CMD_RESET_BOOT_MMT,
        }
    }

    /// Whether `fw-usb::retrying` should wrap this command. PROGRAM and
    /// GET_DATA are not retriable: PROGRAM has no response to resynchronize
    /// on, and GET_DATA retried blindly could mask a real verify mismatch.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Command::Program { .. } | Command::GetData { .. })
    }

    /// Whether this command expects a response frame at all.
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Command::Query { .. }
                | Command::GetData { .. }
                | Command::BootFwVersionRequest { .. }
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Command::Query { device_id } => {
                let mut buf = Vec::with_capacity(10);
                buf.push(CMD_QUERY);
                buf.extend_from_slice(&PASSWORD_QUERY);
                buf.push(*device_id);
                Ok(buf)
            }
            Command::Erase => Ok(vec![CMD_ERASE]),
            Command::Program { addr, chunk } => {
                if chunk.len() > BYTES_PER_PACKET {
                    return Err(ProtocolError::ChunkTooLarge(chunk.len()));
                }
                let mut buf = Vec::with_capacity(64);
                buf.push(CMD_PROGRAM);
                buf.extend_from_slice(&addr.to_le_bytes());
                buf.push(chunk.len() as u8);
                buf.extend(std::iter::repeat(0u8).take(58 - chunk.len()));
                buf.extend_from_slice(chunk);
                Ok(buf)
            }
            Command::ProgramComplete { digest } => {
                let mut buf = Vec::with_capacity(64);
                buf.push(CMD_PROGRAM_COMPLETE);
                buf.extend_from_slice(&digest.to_le_bytes());
                buf.extend(std::iter::repeat(0xFFu8).take(61));
                Ok(buf)
            }
            Command::GetData { addr, length } => {
                if *length as usize > BYTES_PER_PACKET {
                    return Err(ProtocolError::ChunkTooLarge(*length as usize));
                }
                let mut buf = Vec::with_capacity(6);
                buf.push(CMD_GET_DATA);
                buf.extend_from_slice(&addr.to_le_bytes());
                buf.push(*length);
                Ok(buf)
            }
            Command::JumpToApplication => Ok(vec![CMD_JUMP_TO_APPLICATION]),
            Command::BootFwVersionRequest { device_id } => {
                Ok(vec![CMD_BOOT_FW_VERSION_REQUEST, *device_id])
            }
            Command::ResetBootMmt => Ok(vec![CMD_RESET_BOOT_MMT]),
        }
    }
}
