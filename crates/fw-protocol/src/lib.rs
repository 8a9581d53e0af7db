//! # fw-protocol: bootloader command protocol
//!
//! Encodes/decodes the fixed 64-byte command frames exchanged with a board
//! running the USB bootloader, and layers a [`BootloaderClient`] over
//! [`fw_usb::UsbTransport`] that applies the retry decorator to the commands
//! that can safely be retried.
//!
//! ## Design Philosophy
//!
//! Every command is a variant of [`Command`] rather than a free function
//! that builds bytes inline — this keeps the "is this retriable", "does
//! this expect a response", and "how is this encoded" facts attached to one
//! type instead of scattered across call sites. Response decoding lives
//! separately in [`response`] since a response is not tied 1:1 to the
//! command that produced it (GET_DATA's response shape, for instance, has
//! nothing in common with its request).

mod client;
mod command;
mod error;
mod response;

pub use client::{BootloaderClient, DEFAULT_DEVICE_ID, MIN_ERASE_TIMEOUT};
pub use command::{Command, BYTES_PER_PACKET};
pub use error::ProtocolError;
pub use response::{decode_boot_fw_version_response, decode_get_data_response, decode_query_response, QueryResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use fw_usb::mock::MockChannel;
    use fw_usb::UsbTransport;
    use std::time::Duration;

    fn client_with(channel: MockChannel) -> BootloaderClient {
        BootloaderClient::new(
            UsbTransport::new(Box::new(channel)),
            0,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        )
    }

    /// `02 38 02 01 00100000 00400000 FF 01 01 09 03 00 FFFF`
    /// start_addr=0x1000, length_words=0x4000, proto_ver=1,
    /// boot_version=(1,9,3), boot_status=0, digest=0xFFFF.
    fn query_response_bytes() -> Vec<u8> {
        vec![
            0x02, 0x38, 0x02, 0x01, 0x00, 0x10, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0xFF, 0x01,
            0x01, 0x09, 0x03, 0x00, 0xFF, 0xFF,
        ]
    }

    #[test]
    fn query_decodes_seed_scenario_two() {
        let mut channel = MockChannel::new();
        channel.push_read(query_response_bytes());
        let mut client = client_with(channel);

        let resp = client.query(None).unwrap();
        assert_eq!(resp.start_addr, 0x1000);
        assert_eq!(resp.length_words, 0x4000);
        assert_eq!(resp.proto_ver, 1);
        assert_eq!(resp.boot_version, Some((1, 9, 3)));
        assert_eq!(resp.boot_status, 0);
        assert_eq!(resp.digest, Some(0xFFFF));
    }

    #[test]
    fn query_request_frame_carries_device_id_and_password() {
        let frame = Command::Query { device_id: 7 }.encode().unwrap();
        assert_eq!(frame[0], 0x02);
        assert_eq!(&frame[1..9], &crate::command::PASSWORD_QUERY);
        assert_eq!(frame[9], 7);
    }

    #[test]
    fn query_rejects_wrong_bytes_per_packet() {
        let mut bad = query_response_bytes();
        bad[1] = 40;
        let err = decode_query_response(&bad).unwrap_err();
        assert!(matches!(err, ProtocolError::Violation(_)));
    }

    #[test]
    fn query_proto_ver_zero_reports_version_unavailable() {
        let mut bytes = query_response_bytes();
        bytes[13] = 0;
        let resp = decode_query_response(&bytes).unwrap();
        assert_eq!(resp.boot_version, None);
        assert_eq!(resp.digest, None);
    }

    #[test]
    fn program_right_aligns_chunk_of_one_byte() {
        let frame = Command::Program {
            addr: 0x1000,
            chunk: vec![0xAA],
        }
        .encode()
        .unwrap();

        assert_eq!(frame[0], 0x05);
        assert_eq!(&frame[1..5], &0x1000u32.to_le_bytes());
        assert_eq!(frame[5], 1);
        assert!(frame[6..63].iter().all(|&b| b == 0));
        assert_eq!(frame[63], 0xAA);
    }

    #[test]
    fn program_accepts_empty_and_full_chunks() {
        assert!(Command::Program {
            addr: 0,
            chunk: vec![],
        }
        .encode()
        .is_ok());
        assert!(Command::Program {
            addr: 0,
            chunk: vec![0u8; BYTES_PER_PACKET],
        }
        .encode()
        .is_ok());
    }

    #[test]
    fn program_rejects_oversized_chunk() {
        let err = Command::Program {
            addr: 0,
            chunk: vec![0u8; BYTES_PER_PACKET + 1],
        }
        .encode()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::ChunkTooLarge(57)));
    }

    #[test]
    fn get_data_strips_right_alignment_padding() {
        let mut raw = vec![0u8; 64];
        raw[0] = 0x07;
        raw[5] = 3;
        raw[6 + 58 - 3] = 0x11;
        raw[6 + 58 - 2] = 0x22;
        raw[6 + 58 - 1] = 0x33;

        let payload = decode_get_data_response(&raw).unwrap();
        assert_eq!(payload, vec![0x11, 0x22, 0x33]);
    }

    #[test]
    fn get_data_round_trips_through_client() {
        let mut channel = MockChannel::new();
        let mut raw = vec![0u8; 64];
        raw[0] = 0x07;
        raw[5] = 2;
        raw[6 + 58 - 2] = 0xDE;
        raw[6 + 58 - 1] = 0xAD;
        channel.push_read(raw);

        let mut client = client_with(channel);
        let data = client.get_data(0x2000, 2).unwrap();
        assert_eq!(data, vec![0xDE, 0xAD]);
    }

    #[test]
    fn erase_resynchronizes_with_a_follow_up_query() {
        let mut channel = MockChannel::new();
        channel.push_read(query_response_bytes());
        let mut client = client_with(channel);

        let resp = client.erase(None).unwrap();
        assert_eq!(resp.start_addr, 0x1000);
    }

    #[test]
    fn commands_without_a_response_do_not_block_on_read() {
        let channel = MockChannel::new();
        let mut client = client_with(channel);
        client.jump_to_application().unwrap();
        client.reset_boot_mmt().unwrap();
    }

    #[test]
    fn program_and_get_data_are_not_retriable() {
        assert!(!Command::Program {
            addr: 0,
            chunk: vec![],
        }
        .is_retriable());
        assert!(!Command::GetData { addr: 0, length: 0 }.is_retriable());
        assert!(Command::Query { device_id: 0 }.is_retriable());
        assert!(Command::Erase.is_retriable());
    }
}
