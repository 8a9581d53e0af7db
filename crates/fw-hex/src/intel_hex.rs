use crate::error::HexError;
use crate::image::SparseImage;

const RECORD_DATA: u8 = 0x00;
const RECORD_EOF: u8 = 0x01;
const RECORD_EXT_LINEAR_ADDR: u8 = 0x04;

fn hex_byte(s: &str, line: usize) -> Result<u8, HexError> {
    u8::from_str_radix(s, 16).map_err(|_| HexError::InvalidHexDigit { line })
}

fn hex_u16(s: &str, line: usize) -> Result<u16, HexError> {
    u16::from_str_radix(s, 16).map_err(|_| HexError::InvalidHexDigit { line })
}

/// Parse one `:LLAAAATT[DD...]CC` record line into its fields, validating
/// the two's-complement checksum over length+address+type+data+checksum.
struct Record {
    rtype: u8,
    offset: u16,
    payload: Vec<u8>,
}

fn parse_record(raw: &str, line_no: usize) -> Result<Record, HexError> {
    let line = raw.trim();
    let body = line
        .strip_prefix(':')
        .ok_or(HexError::MissingColon { line: line_no })?;

    if body.len() % 2 != 0 {
        return Err(HexError::OddDigitCount { line: line_no });
    }
    if body.len() < 10 {
        return Err(HexError::RecordTooShort { line: line_no });
    }

    let record_length = hex_byte(&body[0..2], line_no)? as usize;
    let offset = hex_u16(&body[2..6], line_no)?;
    let rtype = hex_byte(&body[6..8], line_no)?;

    let payload_end = 8 + record_length * 2;
    let checksum_end = payload_end + 2;
    if body.len() < checksum_end {
        return Err(HexError::ShortPayload { line: line_no });
    }

    let payload_hex = &body[8..payload_end];
    let mut payload = Vec::with_capacity(record_length);
    for i in 0..record_length {
        payload.push(hex_byte(&payload_hex[i * 2..i * 2 + 2], line_no)?);
    }
    let checksum = hex_byte(&body[payload_end..checksum_end], line_no)?;

    let mut sum: u32 = 0;
    for i in 0..(record_length + 4) {
        sum += hex_byte(&body[i * 2..i * 2 + 2], line_no)? as u32;
    }
    let calculated = (!sum).wrapping_add(1) as u8;
    if calculated != checksum {
        return Err(HexError::BadChecksum {
            line: line_no,
            expected: checksum,
            calculated,
        });
    }

    Ok(Record {
        rtype,
        offset,
        payload,
    })
}

/// Parse Intel HEX text into a sparse address-to-byte map.
///
/// Honors only the four record types this bootloader family emits: `DATA`,
/// `EOF`, and `EXTENDED_LINEAR_ADDRESS`; any other record type is ignored
/// rather than rejected, matching the original tool's behavior.
pub fn load_hex(text: &str) -> Result<SparseImage, HexError> {
    let mut image = SparseImage::new();
    let mut ext_linear_addr: Option<u32> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = parse_record(trimmed, line_no)?;

        match record.rtype {
            RECORD_EXT_LINEAR_ADDR => {
                if record.payload.len() < 2 {
                    return Err(HexError::ShortPayload { line: line_no });
                }
                let hi = ((record.payload[0] as u32) << 8) | record.payload[1] as u32;
                ext_linear_addr = Some(hi);
            }
            RECORD_EOF => break,
            RECORD_DATA => {
                let base = ext_linear_addr.unwrap_or(0) << 16;
                let full_address = base + record.offset as u32;
                for (i, byte) in record.payload.iter().enumerate() {
                    image.set(full_address + i as u32, *byte);
                }
            }
            _ => {
                log::debug!(
                    "line {line_no}: ignoring unsupported record type {:#04X}",
                    record.rtype
                );
            }
        }
    }

    Ok(image)
}
