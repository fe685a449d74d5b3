//! Oracle beacons and their wire encoding.
//!
//! A beacon is the only broadcast in the system. It advertises where the sender is, how much
//! public buffer space it has left, and as much of its location table as fits into one packet:
//!
//! ```notrust
//! LSB                                                                       MSB
//! +---------+-----------------+-------------+--------------+----------------+
//! |   CRC   | Sender location | Free buffer | Location cnt | Locations ...  |
//! |(4 bytes)|   (20 bytes)    |  (4 bytes)  |  (4 bytes)   | (20 bytes each)|
//! +---------+-----------------+-------------+--------------+----------------+
//! ```
//!
//! Each location record is `addr (4) | x (4) | y (4) | z (4) | timestamp (4)`. The timestamp is
//! in whole seconds of the *original observer's* clock; it is never compared across nodes, only
//! against other timestamps reported for the same node.

use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

use crate::addr::NodeAddr;
use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::crc::crc32_with_hole;
use crate::geo::Point;
use crate::link::MAX_PACKET_SIZE;
use crate::Error;

/// Size in bytes of one encoded location record.
pub const NODE_LOCATION_SIZE: usize = 20;

/// Size in bytes of the encoded beacon up to the location array.
pub const BEACON_HEADER_SIZE: usize = 32;

/// The most location records one beacon can carry.
pub const MAX_BEACON_LOCATIONS: usize = (MAX_PACKET_SIZE - BEACON_HEADER_SIZE) / NODE_LOCATION_SIZE;

/// A node's last known whereabouts, as carried in beacons.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeLocation {
    pub addr: NodeAddr,
    pub pos: Point,
    /// Seconds of the clock of whoever observed this position.
    pub timestamp: u32,
}

impl ToBytes for NodeLocation {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_i32_le(self.addr.0)?;
        writer.write_i32_le(self.pos.x)?;
        writer.write_i32_le(self.pos.y)?;
        writer.write_i32_le(self.pos.z)?;
        writer.write_u32_le(self.timestamp)
    }
}

impl<'a> FromBytes<'a> for NodeLocation {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        Ok(NodeLocation {
            addr: NodeAddr(bytes.read_i32_le()?),
            pos: Point::new(
                bytes.read_i32_le()?,
                bytes.read_i32_le()?,
                bytes.read_i32_le()?,
            ),
            timestamp: bytes.read_u32_le()?,
        })
    }
}

/// One oracle broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeaconPdu {
    /// The sender's own address, position, and clock reading.
    pub sender: NodeLocation,
    /// Free bytes in the sender's public store-and-forward buffer.
    pub free_buffer: u32,
    /// Piggy-backed locations of other nodes the sender knows about.
    pub locations: Vec<NodeLocation>,
}

impl BeaconPdu {
    /// Total size of the encoded beacon in bytes.
    pub fn wire_size(&self) -> usize {
        BEACON_HEADER_SIZE + self.locations.len() * NODE_LOCATION_SIZE
    }

    /// Encodes the beacon, computing and patching in the CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0; self.wire_size()];
        {
            let mut writer = ByteWriter::new(&mut buf);
            let _ = writer.write_u32_le(0);
            let _ = self.sender.to_bytes(&mut writer);
            let _ = writer.write_u32_le(self.free_buffer);
            let _ = writer.write_u32_le(self.locations.len() as u32);
            for loc in &self.locations {
                let _ = loc.to_bytes(&mut writer);
            }
        }
        let sum = crc32_with_hole(&buf, 0);
        LittleEndian::write_u32(&mut buf, sum);
        buf
    }

    /// Decodes and verifies a received beacon.
    ///
    /// The structural check (does the location count match the length?) runs before the CRC so
    /// that a mangled count field cannot send the checksum reading out of bounds.
    pub fn decode(bytes: &[u8]) -> Result<BeaconPdu, Error> {
        if bytes.len() < BEACON_HEADER_SIZE || bytes.len() > MAX_PACKET_SIZE {
            return Err(Error::InvalidLength);
        }

        let mut reader = ByteReader::new(bytes);
        let stored = reader.read_u32_le()?;
        let sender = NodeLocation::from_bytes(&mut reader)?;
        let free_buffer = reader.read_u32_le()?;
        let count = reader.read_u32_le()? as usize;
        if count * NODE_LOCATION_SIZE != reader.bytes_left() {
            return Err(Error::InvalidLength);
        }
        if crc32_with_hole(bytes, 0) != stored {
            return Err(Error::ChecksumMismatch);
        }

        let mut locations = Vec::with_capacity(count);
        for _ in 0..count {
            locations.push(NodeLocation::from_bytes(&mut reader)?);
        }

        Ok(BeaconPdu {
            sender,
            free_buffer,
            locations,
        })
    }
}
