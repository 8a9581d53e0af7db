use crate::error::ProtocolError;

const QUERY_RESPONSE_LEN: usize = 20;
const CMD_QUERY: u8 = 0x02;
const CMD_GET_DATA: u8 = 0x07;
const CMD_BOOT_FW_VERSION_REQUEST: u8 = 0x0A;

/// Decoded QUERY response, with every fixed field already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub start_addr: u32,
    pub length_words: u32,
    pub proto_ver: u8,
    /// `None` when `proto_ver == 0` ("not available").
    pub boot_version: Option<(u8, u8, u8)>,
    pub boot_status: u8,
    /// `None` when `proto_ver == 0` ("not available").
    pub digest: Option<u16>,
}

pub fn decode_query_response(buf: &[u8]) -> Result<QueryResponse, ProtocolError> {
    if buf.len() < QUERY_RESPONSE_LEN {
        return Err(ProtocolError::ResponseTooShort {
            got: buf.len(),
            need: QUERY_RESPONSE_LEN,
        });
    }

    let cmd_id = buf[0];
    let bytes_per_packet = buf[1];
    let bytes_per_address = buf[2];
    let memory_type = buf[3];
    let start_addr = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let length_words = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let marker = buf[12];
    let proto_ver = buf[13];
    let ver_major = buf[14];
    let ver_minor = buf[15];
    let ver_patch = buf[16];
    let boot_status = buf[17];
    let digest = u16::from_le_bytes([buf[18], buf[19]]);

    if cmd_id != CMD_QUERY {
        return Err(ProtocolError::Violation(format!(
            "expected cmd_id {CMD_QUERY:#04X}, got {cmd_id:#04X}"
        )));
    }
    if bytes_per_packet != 56 {
        return Err(ProtocolError::Violation(format!(
            "bytes_per_packet must be 56, got {bytes_per_packet}"
        )));
    }
    if bytes_per_address != 2 {
        return Err(ProtocolError::Violation(format!(
            "bytes_per_address must be 2, got {bytes_per_address}"
        )));
    }
    if memory_type != 1 {
        return Err(ProtocolError::Violation(format!(
            "memory_type must be 1, got {memory_type}"
        )));
    }
    if marker != 0xFF {
        return Err(ProtocolError::Violation(format!(
            "marker must be 0xFF, got {marker:#04X}"
        )));
    }
    if proto_ver > 1 {
        return Err(ProtocolError::Violation(format!(
            "proto_ver must be 0 or 1, got {proto_ver}"
        )));
    }

    if boot_status > 0 {
        log::warn!("reported boot status is {boot_status}");
    }

    let (boot_version, digest) = if proto_ver > 0 {
        (Some((ver_major, ver_minor, ver_patch)), Some(digest))
    } else {
        (None, None)
    };

    Ok(QueryResponse {
        start_addr,
        length_words,
        proto_ver,
        boot_version,
        boot_status,
        digest,
    })
}

/// Decode a GET_DATA response, returning the right-aligned payload with its
/// leading padding stripped.
pub fn decode_get_data_response(buf: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if buf.len() < 64 {
        return Err(ProtocolError::ResponseTooShort {
            got: buf.len(),
            need: 64,
        });
    }

    let cmd_id = buf[0];
    let bytes_per_packet = buf[5] as usize;

    if cmd_id != CMD_GET_DATA {
        return Err(ProtocolError::Violation(format!(
            "expected cmd_id {CMD_GET_DATA:#04X}, got {cmd_id:#04X}"
        )));
    }
    if bytes_per_packet > 58 {
        return Err(ProtocolError::Violation(format!(
            "bytes_per_packet {bytes_per_packet} exceeds the 58-byte field"
        )));
    }

    let field = &buf[6..64];
    Ok(field[58 - bytes_per_packet..].to_vec())
}

/// Decoded `BOOT_FW_VERSION_REQUEST` response.
pub fn decode_boot_fw_version_response(buf: &[u8]) -> Result<(u8, u8, u8), ProtocolError> {
    if buf.len() < 4 {
        return Err(ProtocolError::ResponseTooShort {
            got: buf.len(),
            need: 4,
        });
    }
    let cmd_id = buf[0];
    if cmd_id != CMD_BOOT_FW_VERSION_REQUEST {
        return Err(ProtocolError::Violation(format!(
            "expected cmd_id {CMD_BOOT_FW_VERSION_REQUEST:#04X}, got {cmd_id:#04X}"
        )));
    }
    Ok((buf[1], buf[2], buf[3]))
}
