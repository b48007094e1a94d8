//! Rolling checksum styles used across the vehicle family.
//!
//! Different model years ship different checksum conventions on the same
//! messages: a CRC-8 on 2019+ models, a plain byte sum on older ones, and a
//! 4-bit nibble sum on the cruise and collision-avoidance messages.

use crc::{Algorithm, Crc};

/// Family CRC-8 (poly 0x1D, init 0xFD, xorout 0xDF), as seen on 2019+ models
pub const CRC8_HKG: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x1d,
    init: 0xfd,
    refin: false,
    refout: false,
    xorout: 0xdf,
    check: 0xa1,
    residue: 0x00,
};

/// Compute the family CRC-8 over the given segments.
pub fn crc8(segments: &[&[u8]]) -> u8 {
    let crc = Crc::<u8>::new(&CRC8_HKG);
    let mut digest = crc.digest();
    for segment in segments {
        digest.update(segment);
    }
    digest.finalize()
}

/// Plain byte sum modulo 256, as seen on older models.
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// 4-bit nibble-sum complement used by the cruise controller messages:
/// the sum of all payload nibbles, complemented to 16.
pub fn nibble_sum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|&b| ((b >> 4) + (b & 0x0F)) as u32).sum();
    ((16 - (sum % 16)) % 16) as u8
}
