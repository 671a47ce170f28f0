//! PriorityPacket header: 4-bit priority and 12-bit payload length.
//!
//! ```text
//! byte0: low nibble = priority, high nibble = length & 0x0F
//! byte1: length >> 4
//! ```

use crate::error::{ProtocolError, ProtocolResult};

/// Encoded header length.
pub const PACKET_HEADER_LEN: usize = 2;

/// Largest payload one packet can carry.
pub const MAX_PACKET_PAYLOAD: usize = 0x0FFF;

/// Packet priority (0..=15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    pub const STREAMING: Priority = Priority(0);
    pub const TRANSACTIONAL: Priority = Priority(3);
    /// Server-to-client control packets.
    pub const CONTROL: Priority = Priority(15);

    pub fn new(value: u8) -> ProtocolResult<Self> {
        if value > 0x0F {
            return Err(ProtocolError::InvalidPriority(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_control(self) -> bool {
        self == Self::CONTROL
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub priority: Priority,
    pub length: u16,
}

impl PacketHeader {
    pub fn new(priority: Priority, length: usize) -> ProtocolResult<Self> {
        if length > MAX_PACKET_PAYLOAD {
            return Err(ProtocolError::PacketTooLong(length));
        }
        Ok(Self {
            priority,
            length: length as u16,
        })
    }

    pub fn encode(&self) -> [u8; PACKET_HEADER_LEN] {
        [
            self.priority.0 | (((self.length & 0x0F) as u8) << 4),
            (self.length >> 4) as u8,
        ]
    }

    /// Every 2-byte pattern is a valid header.
    pub fn decode(bytes: [u8; PACKET_HEADER_LEN]) -> Self {
        Self {
            priority: Priority(bytes[0] & 0x0F),
            length: u16::from(bytes[0] >> 4) | (u16::from(bytes[1]) << 4),
        }
    }
}

/// A priority packet with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityPacket {
    pub priority: Priority,
    pub payload: Vec<u8>,
}

impl PriorityPacket {
    pub fn new(priority: Priority, payload: Vec<u8>) -> ProtocolResult<Self> {
        if payload.len() > MAX_PACKET_PAYLOAD {
            return Err(ProtocolError::PacketTooLong(payload.len()));
        }
        Ok(Self { priority, payload })
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            priority: self.priority,
            length: self.payload.len() as u16,
        }
    }

    /// Appends header and payload to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.header().encode());
        out.extend_from_slice(&self.payload);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PACKET_HEADER_LEN + self.payload.len());
        self.write_to(&mut out);
        out
    }
}
