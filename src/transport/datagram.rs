//! Datagrams: one fragment of an application message, plus its wire encoding.
//!
//! ```notrust
//! LSB                                                                              MSB
//! +---------+----------+----------+----------+----------+------------+--------------+
//! |   CRC   | Msg size |  Source  | Msg num  | Frag num | Frag count | Fragment ... |
//! |(4 bytes)| (4 bytes)| (4 bytes)| (4 bytes)| (4 bytes)| (4 bytes)  |              |
//! +---------+----------+----------+----------+----------+------------+--------------+
//! ```
//!
//! A message is identified by `(source, msg_num)` end to end; `msg_num` is allocated by the
//! origin and increases monotonically there. Every datagram of a message carries the same
//! `frag_count`, and `msg_size` is the size of *this* fragment — the full fragment size for all
//! but possibly the last one. The CRC-32 covers the whole encoded datagram with the CRC field
//! zeroed.

use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

use crate::addr::NodeAddr;
use crate::bytes::{ByteReader, ByteWriter};
use crate::crc::crc32_with_hole;
use crate::net::MAX_DATAGRAM_SIZE;
use crate::Error;

/// Size in bytes of the encoded datagram header.
pub const DATAGRAM_HEADER_SIZE: usize = 24;

/// Largest fragment a single datagram can carry.
pub const MAX_FRAGMENT_SIZE: usize = MAX_DATAGRAM_SIZE - DATAGRAM_HEADER_SIZE;

/// A transport-layer PDU carrying one fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
    /// The node that originated the message.
    pub source: NodeAddr,
    /// Serial number of the message at its origin.
    pub msg_num: i32,
    /// Index of this fragment within the message.
    pub frag_num: i32,
    /// Total number of fragments in the message.
    pub frag_count: i32,
    pub payload: Vec<u8>,
}

impl Datagram {
    /// Total size of the encoded datagram in bytes.
    pub fn wire_size(&self) -> usize {
        DATAGRAM_HEADER_SIZE + self.payload.len()
    }

    /// Encodes the datagram, computing and patching in the CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0; self.wire_size()];
        {
            let mut writer = ByteWriter::new(&mut buf);
            let _ = writer.write_u32_le(0);
            let _ = writer.write_u32_le(self.payload.len() as u32);
            let _ = writer.write_i32_le(self.source.0);
            let _ = writer.write_i32_le(self.msg_num);
            let _ = writer.write_i32_le(self.frag_num);
            let _ = writer.write_i32_le(self.frag_count);
            let _ = writer.write_slice(&self.payload);
        }
        let sum = crc32_with_hole(&buf, 0);
        LittleEndian::write_u32(&mut buf, sum);
        buf
    }

    /// Decodes and verifies a received datagram.
    ///
    /// Rejects length mismatches, out-of-range fragment coordinates, and CRC failures.
    pub fn decode(bytes: &[u8]) -> Result<Datagram, Error> {
        if bytes.len() < DATAGRAM_HEADER_SIZE || bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(Error::InvalidLength);
        }

        let mut reader = ByteReader::new(bytes);
        let stored = reader.read_u32_le()?;
        let msg_size = reader.read_u32_le()? as usize;
        let source = NodeAddr(reader.read_i32_le()?);
        let msg_num = reader.read_i32_le()?;
        let frag_num = reader.read_i32_le()?;
        let frag_count = reader.read_i32_le()?;

        if msg_size != reader.bytes_left() || msg_size > MAX_FRAGMENT_SIZE {
            return Err(Error::InvalidLength);
        }
        if frag_count < 1 || frag_num < 0 || frag_num >= frag_count {
            return Err(Error::InvalidValue);
        }
        if crc32_with_hole(bytes, 0) != stored {
            return Err(Error::ChecksumMismatch);
        }

        Ok(Datagram {
            source,
            msg_num,
            frag_num,
            frag_count,
            payload: reader.read_rest().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Datagram {
        Datagram {
            source: NodeAddr(3),
            msg_num: 17,
            frag_num: 1,
            frag_count: 4,
            payload: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn round_trip() {
        let d = sample();
        let bytes = d.encode();
        assert_eq!(bytes.len(), DATAGRAM_HEADER_SIZE + 5);
        assert_eq!(Datagram::decode(&bytes).unwrap(), d);
    }

    #[test]
    fn empty_fragment_round_trips() {
        let d = Datagram {
            source: NodeAddr(1),
            msg_num: 0,
            frag_num: 0,
            frag_count: 1,
            payload: Vec::new(),
        };
        assert_eq!(Datagram::decode(&d.encode()).unwrap(), d);
    }

    #[test]
    fn any_flipped_bit_is_rejected() {
        let bytes = sample().encode();
        for bit in 0..bytes.len() * 8 {
            let mut corrupted = bytes.clone();
            corrupted[bit / 8] ^= 1 << (bit % 8);
            assert!(
                Datagram::decode(&corrupted).is_err(),
                "flipping bit {} went undetected",
                bit
            );
        }
    }

    #[test]
    fn fragment_coordinates_are_checked() {
        let mut d = sample();
        d.frag_num = 4;
        let bytes = d.encode();
        assert_eq!(Datagram::decode(&bytes), Err(Error::InvalidValue));

        d.frag_num = 0;
        d.frag_count = 0;
        assert_eq!(Datagram::decode(&d.encode()), Err(Error::InvalidValue));
    }

    #[test]
    fn truncation_is_rejected() {
        let mut bytes = sample().encode();
        bytes.pop();
        assert_eq!(Datagram::decode(&bytes), Err(Error::InvalidLength));
    }
}
