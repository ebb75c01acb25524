//! CRC-16/CCITT used to seal a record.
//!
//! The checksum lives in the last two bytes of the record, little-endian, and covers every byte
//! before it.

use crate::error::Error;

/// Size of the checksum field at the end of a sealed record.
pub const CHECKSUM_SIZE: usize = 2;

const POLYNOMIAL: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// CRC-16/CCITT (polynomial 0x1021, init 0xFFFF, MSB first, no final XOR).
pub const fn crc16_ccitt(data: &[u8]) -> u16 {
    crc16_ccitt_update(INIT, data)
}

/// Continue a CRC-16/CCITT computation over `data`, starting from `crc`.
pub const fn crc16_ccitt_update(mut crc: u16, data: &[u8]) -> u16 {
    let mut i = 0;
    while i < data.len() {
        crc ^= (data[i] as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }
        i += 1;
    }
    crc
}

/// Checksum over all bytes of `record` except the trailing checksum field.
///
/// # Panics
/// Panics if `record` is shorter than [`CHECKSUM_SIZE`].
pub fn checksum(record: &[u8]) -> u16 {
    crc16_ccitt(&record[..record.len() - CHECKSUM_SIZE])
}

/// The checksum currently held in the last two bytes of `record`.
///
/// # Panics
/// Panics if `record` is shorter than [`CHECKSUM_SIZE`].
pub fn stored_checksum(record: &[u8]) -> u16 {
    let tail = record.len() - CHECKSUM_SIZE;
    u16::from_le_bytes([record[tail], record[tail + 1]])
}

/// Compute the checksum of `record` and write it into its trailing two bytes.
///
/// # Panics
/// Panics if `record` is shorter than [`CHECKSUM_SIZE`].
pub fn seal(record: &mut [u8]) -> u16 {
    let crc = checksum(record);
    let tail = record.len() - CHECKSUM_SIZE;
    record[tail..].copy_from_slice(&crc.to_le_bytes());
    crc
}

/// Compare the stored checksum against the one computed over the payload.
pub fn verify(record: &[u8]) -> Result<(), Error> {
    let stored = stored_checksum(record);
    let computed = checksum(record);
    if stored == computed {
        Ok(())
    } else {
        Err(Error::IntegrityFailure { stored, computed })
    }
}
