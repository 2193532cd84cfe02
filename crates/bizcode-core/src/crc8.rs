//! CRC-8 checksum (polynomial `0x07`, init `0x00`, no reflection, no xor-out).
//!
//! Both halves of a frame code and the composite prefix use this one
//! algorithm, so a given byte string always lands on the same 0..=255 value.

use crc::{Crc, CRC_8_SMBUS};

static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Checksum `bytes`.
///
/// ```
/// assert_eq!(bizcode_core::crc8::checksum(b"123456789"), 0xF4);
/// ```
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    CRC8.checksum(bytes)
}
