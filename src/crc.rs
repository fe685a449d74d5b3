//! Checksumming of encoded PDUs.
//!
//! Frames, datagrams, and oracle beacons each carry a CRC-32 computed over their whole encoding
//! with the checksum field itself zeroed: the sender encodes with a zero field, checksums, and
//! patches the field in place; the receiver recomputes the same sum with the field treated as
//! zero and compares it against the stored value.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Width of the checksum field in every PDU that carries one.
pub const CRC_SIZE: usize = 4;

/// CRC-32 of `bytes`, with the `CRC_SIZE` bytes starting at `field_offset` treated as zero.
pub fn crc32_with_hole(bytes: &[u8], field_offset: usize) -> u32 {
    let mut digest = CRC32.digest();
    digest.update(&bytes[..field_offset]);
    digest.update(&[0; CRC_SIZE]);
    digest.update(&bytes[field_offset + CRC_SIZE..]);
    digest.finalize()
}
