use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE over a programmed region: 0xFFFF init, 0x1021 poly, no
/// reflection. This is the variant the bootloader's own `PROGRAM_COMPLETE`
/// digest check uses.
const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

pub fn digest(data: &[u8]) -> u16 {
    CRC.checksum(data)
}
