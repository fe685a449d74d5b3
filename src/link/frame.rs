//! Link-layer frames and their wire encoding.
//!
//! Every transmission on the channel is one frame. The encoding is:
//!
//! ```notrust
//! LSB                                                              MSB
//! +----------+----------+----------+-------------+---------+---------+
//! |   Kind   |   Dest   |   Src    | Payload len |   CRC   | Payload |
//! | (1 byte) | (4 bytes)| (4 bytes)|  (8 bytes)  |(4 bytes)|         |
//! +----------+----------+----------+-------------+---------+---------+
//! ```
//!
//! All fields are little-endian. The CRC-32 covers the whole encoded frame with the CRC field
//! zeroed; receivers recompute it the same way and drop any frame whose stored value differs.
//! `Dest` is the broadcast sentinel for beacons and a unicast address for everything else.

use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

use crate::addr::NodeAddr;
use crate::bytes::{ByteReader, ByteWriter};
use crate::crc::crc32_with_hole;
use crate::Error;

/// Size in bytes of the encoded frame header.
pub const FRAME_HEADER_SIZE: usize = 21;

/// Largest encoded frame the wireless channel accepts (the 802.11 MTU).
pub const MAX_FRAME_SIZE: usize = 2312;

/// Largest payload a single frame can carry.
pub const MAX_PACKET_SIZE: usize = MAX_FRAME_SIZE - FRAME_HEADER_SIZE;

/// Byte offset of the CRC field within the encoded frame.
const CRC_OFFSET: usize = 17;

enum_with_unknown! {
    /// Discriminates what a frame carries and which handler it is for.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum FrameKind(u8) {
        /// A network-layer packet travelling between two stations.
        Data = 0,
        /// A broadcast oracle beacon.
        Beacon = 1,
        /// Request to send: opens the unicast handshake.
        Rts = 2,
        /// Clear to send: the receiver is ready for the data frame.
        Cts = 3,
        /// Acknowledges a received data frame, closing the handshake.
        Ack = 4
    }
}

/// A link-layer PDU.
///
/// Frames are constructed in-layer, handed to the radio by value, and discarded. Control frames
/// (RTS/CTS/ACK) carry no payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub dest: NodeAddr,
    pub src: NodeAddr,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a DATA frame carrying an encoded network packet.
    pub fn data(dest: NodeAddr, src: NodeAddr, payload: Vec<u8>) -> Self {
        Frame {
            kind: FrameKind::Data,
            dest,
            src,
            payload,
        }
    }

    /// Creates a broadcast BEACON frame carrying an encoded oracle beacon.
    pub fn beacon(src: NodeAddr, payload: Vec<u8>) -> Self {
        Frame {
            kind: FrameKind::Beacon,
            dest: NodeAddr::BROADCAST,
            src,
            payload,
        }
    }

    /// Creates a payload-less control frame (RTS, CTS, or ACK).
    pub fn control(kind: FrameKind, dest: NodeAddr, src: NodeAddr) -> Self {
        Frame {
            kind,
            dest,
            src,
            payload: Vec::new(),
        }
    }

    /// Total size of the encoded frame in bytes.
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Encodes the frame, computing and patching in the CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0; self.wire_size()];
        {
            let mut writer = ByteWriter::new(&mut buf);
            // The buffer is sized to fit, so none of these can fail.
            let _ = writer.write_u8(self.kind.into());
            let _ = writer.write_i32_le(self.dest.0);
            let _ = writer.write_i32_le(self.src.0);
            let _ = writer.write_u64_le(self.payload.len() as u64);
            let _ = writer.write_u32_le(0);
            let _ = writer.write_slice(&self.payload);
        }
        let sum = crc32_with_hole(&buf, CRC_OFFSET);
        LittleEndian::write_u32(&mut buf[CRC_OFFSET..], sum);
        buf
    }

    /// Decodes and verifies a received frame.
    ///
    /// Rejects truncated encodings, unknown frame kinds, length fields that disagree with the
    /// buffer, oversized frames, and CRC mismatches.
    pub fn decode(bytes: &[u8]) -> Result<Frame, Error> {
        if bytes.len() < FRAME_HEADER_SIZE || bytes.len() > MAX_FRAME_SIZE {
            return Err(Error::InvalidLength);
        }

        let mut reader = ByteReader::new(bytes);
        let kind = FrameKind::from(reader.read_u8()?);
        if let FrameKind::Unknown(_) = kind {
            return Err(Error::InvalidValue);
        }
        let dest = NodeAddr(reader.read_i32_le()?);
        let src = NodeAddr(reader.read_i32_le()?);
        let payload_len = reader.read_u64_le()?;
        if payload_len != reader.bytes_left() as u64 - 4 {
            return Err(Error::InvalidLength);
        }
        let stored = reader.read_u32_le()?;
        if crc32_with_hole(bytes, CRC_OFFSET) != stored {
            return Err(Error::ChecksumMismatch);
        }

        Ok(Frame {
            kind,
            dest,
            src,
            payload: reader.read_rest().to_vec(),
        })
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Frame({:?} {} -> {}, {} bytes)",
            self.kind,
            self.src,
            self.dest,
            self.payload.len()
        )
    }
}
