//! Network-layer packets and their wire encoding.
//!
//! A packet rides inside a DATA frame's payload:
//!
//! ```notrust
//! LSB                                  MSB
//! +----------+----------+----------+-----+
//! |  Source  |   Dest   |   Len    | Msg |
//! | (4 bytes)| (4 bytes)| (4 bytes)|     |
//! +----------+----------+----------+-----+
//! ```
//!
//! `Source` is the node that originated the packet and `Dest` the node that should finally
//! receive it — neither changes while intermediate stations carry the packet. There is no
//! packet-level checksum; the enclosing frame already covers the bytes.

use alloc::vec;
use alloc::vec::Vec;

use crate::addr::NodeAddr;
use crate::bytes::{ByteReader, ByteWriter};
use crate::link::MAX_PACKET_SIZE;
use crate::Error;

/// Size in bytes of the encoded packet header.
pub const PACKET_HEADER_SIZE: usize = 12;

/// Largest payload a single packet can carry.
pub const MAX_DATAGRAM_SIZE: usize = MAX_PACKET_SIZE - PACKET_HEADER_SIZE;

/// A network-layer PDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// The node that originated this packet.
    pub source: NodeAddr,
    /// The node that should finally receive it.
    pub dest: NodeAddr,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(source: NodeAddr, dest: NodeAddr, payload: Vec<u8>) -> Self {
        Packet {
            source,
            dest,
            payload,
        }
    }

    /// Total size of the encoded packet in bytes.
    pub fn wire_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }

    /// Encodes the packet for hand-off to the link layer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0; self.wire_size()];
        {
            let mut writer = ByteWriter::new(&mut buf);
            let _ = writer.write_i32_le(self.source.0);
            let _ = writer.write_i32_le(self.dest.0);
            let _ = writer.write_i32_le(self.payload.len() as i32);
            let _ = writer.write_slice(&self.payload);
        }
        buf
    }

    /// Decodes a packet from a DATA frame's payload.
    pub fn decode(bytes: &[u8]) -> Result<Packet, Error> {
        if bytes.len() < PACKET_HEADER_SIZE || bytes.len() > MAX_PACKET_SIZE {
            return Err(Error::InvalidLength);
        }

        let mut reader = ByteReader::new(bytes);
        let source = NodeAddr(reader.read_i32_le()?);
        let dest = NodeAddr(reader.read_i32_le()?);
        let len = reader.read_i32_le()?;
        if len < 0 || len as usize != reader.bytes_left() {
            return Err(Error::InvalidLength);
        }

        Ok(Packet {
            source,
            dest,
            payload: reader.read_rest().to_vec(),
        })
    }
}
