//! End-to-end erase → program → verify → seal → jump cycle driven entirely
//! through `fw-loader`'s public API against a scripted USB transport, with
//! no hardware involved.

use fw_hex::{densify, SparseImage};
use fw_loader::{ConnectConfig, FirmwareLoader, LoaderError, LoaderState};
use fw_protocol::BootloaderClient;
use fw_usb::mock::MockChannel;
use fw_usb::UsbTransport;
use std::time::Duration;

fn query_bytes(start_addr: u32, length_words: u32) -> Vec<u8> {
    query_bytes_with_digest(start_addr, length_words, 0xFFFF)
}

fn query_bytes_with_digest(start_addr: u32, length_words: u32, digest: u16) -> Vec<u8> {
    let mut buf = vec![0u8; 20];
    buf[0] = 0x02;
    buf[1] = 56;
    buf[2] = 2;
    buf[3] = 1;
    buf[4..8].copy_from_slice(&start_addr.to_le_bytes());
    buf[8..12].copy_from_slice(&length_words.to_le_bytes());
    buf[12] = 0xFF;
    buf[13] = 1;
    buf[14] = 1;
    buf[15] = 0;
    buf[16] = 0;
    buf[17] = 0;
    buf[18..20].copy_from_slice(&digest.to_le_bytes());
    buf
}

fn get_data_response_frame(data: &[u8]) -> Vec<u8> {
    let mut raw = vec![0u8; 64];
    raw[0] = 0x07;
    raw[5] = data.len() as u8;
    raw[6 + 58 - data.len()..64].copy_from_slice(data);
    raw
}

fn image_for(start_addr: u32, length_words: u32, fill: u8) -> fw_hex::DenseImage {
    let mut sparse = SparseImage::new();
    let range = fw_hex::DenseImage::window_range(start_addr, length_words);
    for (i, addr) in range.clone().enumerate() {
        if !fw_hex::DenseImage::is_phantom_index(addr) {
            sparse.set(addr as u32, fill.wrapping_add(i as u8));
        }
    }
    densify(&sparse, Some(range.end))
}

#[test]
fn full_cycle_erase_program_verify_seal_jump() {
    // `connect()` always opens a real USB device by vendor/product id, so
    // this starts from the post-connect `Connected` state the way a caller
    // would have it right after a successful `connect()` call, and drives
    // every later stage through the mock transport.
    let start_addr = 0x4000;
    let length_words = 4; // 8 bytes, one GET_DATA read
    let image = image_for(start_addr, length_words, 0x55);
    let window = &image[fw_hex::DenseImage::window_range(start_addr, length_words)];

    let crc = fw_loader::digest(window);

    let mut channel = MockChannel::new();
    // erase()'s anti-jump QUERY(0) followed by its internal resynchronization QUERY.
    channel.push_read(query_bytes(start_addr, length_words));
    channel.push_read(query_bytes(start_addr, length_words));
    // verify()'s single GET_DATA read, then its digest re-QUERY.
    channel.push_read(get_data_response_frame(window));
    channel.push_read(query_bytes_with_digest(start_addr, length_words, crc));
    // seal()'s post-settle digest re-QUERY.
    channel.push_read(query_bytes_with_digest(start_addr, length_words, crc));

    let client = BootloaderClient::new(
        UsbTransport::new(Box::new(channel)),
        0,
        Duration::from_millis(500),
        Duration::from_millis(5000),
    );
    let query = fw_protocol::decode_query_response(&query_bytes(start_addr, length_words)).unwrap();
    let mut loader = FirmwareLoader::from_client(
        ConnectConfig::default(),
        client,
        fw_protocol::DEFAULT_DEVICE_ID,
        LoaderState::Connected { query },
    );

    loader.erase().unwrap();
    loader.program(&image).unwrap();
    loader.verify(&image, true).unwrap();
    loader.seal().unwrap();
    assert!(matches!(loader.state(), LoaderState::Sealed { .. }));

    loader.jump().unwrap();
    assert!(matches!(loader.state(), LoaderState::Jumped));
}

#[test]
fn connect_without_an_open_client_requires_a_vendor_product_match() {
    let mut loader = FirmwareLoader::new(ConnectConfig {
        vendor_id: 0xFFFF,
        product_id: 0xFFFF,
        polling_timeout: Duration::from_millis(10),
        polling_interval: Duration::from_millis(5),
        ..ConnectConfig::default()
    });

    let err = loader
        .connect(fw_protocol::DEFAULT_DEVICE_ID, fw_loader::ConnectMode::Polling, None)
        .unwrap_err();
    assert!(matches!(err, LoaderError::EnumerationTimeout { .. } | LoaderError::Usb(_)));
}
