//! Bucket framing shared by both carriers.
//!
//! Outbound, one encoded message is cut into chunks that fit a
//! PriorityPacket once encrypted, and each chunk is sent as a
//! transactional packet. Inbound, a bucket may hold many packets of mixed
//! priorities, and packets (even their 2-byte headers) may be split across
//! reads. `BucketDecoder` keeps that header-level state, decrypts payloads
//! and routes them to one `PacketAssembler` per priority.

use crate::error::TransportResult;
use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use thinlink_crypto::{CipherClass, CipherSuite, CryptoError};
use thinlink_protocol::{
    Message, PacketAssembler, PacketHeader, Priority, PriorityPacket, ProtocolError,
    MAX_PACKET_PAYLOAD, PACKET_HEADER_LEN,
};
use tracing::{debug, warn};

/// Control opcode: reconnect on the u16 LE port that follows.
pub const CONTROL_ALTERNATE_PORT: u8 = 0x01;

/// Control opcode: disconnect.
pub const CONTROL_DISCONNECT: u8 = 0x02;

/// Cipher class used for a packet priority.
pub fn class_of(priority: Priority) -> CipherClass {
    if priority == Priority::STREAMING {
        CipherClass::Streaming
    } else {
        CipherClass::Transactional
    }
}

/// Frames one encoded message as transactional packets.
///
/// An empty message yields an empty bucket.
pub fn encode_bucket(data: &[u8], ciphers: &CipherSuite) -> TransportResult<Vec<u8>> {
    let overhead = ciphers.overhead(CipherClass::Transactional);
    let chunk_len = MAX_PACKET_PAYLOAD.saturating_sub(overhead).max(1);

    let mut out = Vec::with_capacity(data.len() + (data.len() / chunk_len + 1) * (PACKET_HEADER_LEN + overhead));
    for chunk in data.chunks(chunk_len) {
        let payload = ciphers.encrypt(CipherClass::Transactional, chunk)?;
        PriorityPacket::new(Priority::TRANSACTIONAL, payload)?.write_to(&mut out);
    }
    Ok(out)
}

/// Server control signals carried on the control priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    AlternatePort(u16),
    Disconnect,
}

impl ControlSignal {
    /// Parses a control payload. Unknown or short payloads yield `None`.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            [CONTROL_ALTERNATE_PORT, lo, hi, ..] => Some(Self::AlternatePort(u16::from_le_bytes([*lo, *hi]))),
            [CONTROL_DISCONNECT, ..] => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::AlternatePort(port) => {
                let [lo, hi] = port.to_le_bytes();
                vec![CONTROL_ALTERNATE_PORT, lo, hi]
            }
            Self::Disconnect => vec![CONTROL_DISCONNECT],
        }
    }
}

/// One decoded unit of inbound traffic.
#[derive(Debug)]
pub enum Inbound {
    Message { priority: Priority, message: Message },
    /// A message failed to decode; later messages are unaffected.
    ProtocolError { priority: Priority, error: ProtocolError },
    /// A payload failed to decrypt; that priority's stream was reset.
    CipherError { priority: Priority, error: CryptoError },
    Control(ControlSignal),
}

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForHeader,
    WaitingForPayload(PacketHeader),
}

/// Stateful decoder for a sequence of inbound buckets.
pub struct BucketDecoder {
    buffer: BytesMut,
    state: State,
    ciphers: CipherSuite,
    assemblers: HashMap<Priority, PacketAssembler>,
}

impl BucketDecoder {
    pub fn new(ciphers: CipherSuite) -> Self {
        Self {
            buffer: BytesMut::with_capacity(PACKET_HEADER_LEN + MAX_PACKET_PAYLOAD),
            state: State::WaitingForHeader,
            ciphers,
            assemblers: HashMap::new(),
        }
    }

    /// Consumes raw bytes and returns everything that became complete.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Inbound> {
        self.buffer.extend_from_slice(data);
        let mut out = Vec::new();
        loop {
            match self.state {
                State::WaitingForHeader => {
                    if self.buffer.len() < PACKET_HEADER_LEN {
                        break;
                    }
                    let header = PacketHeader::decode([self.buffer[0], self.buffer[1]]);
                    self.buffer.advance(PACKET_HEADER_LEN);
                    self.state = State::WaitingForPayload(header);
                }
                State::WaitingForPayload(header) => {
                    let len = usize::from(header.length);
                    if self.buffer.len() < len {
                        break;
                    }
                    let payload = self.buffer.split_to(len);
                    self.state = State::WaitingForHeader;
                    self.handle_packet(header.priority, &payload, &mut out);
                }
            }
        }
        out
    }

    fn handle_packet(&mut self, priority: Priority, payload: &[u8], out: &mut Vec<Inbound>) {
        if priority.is_control() {
            match ControlSignal::parse(payload) {
                Some(signal) => out.push(Inbound::Control(signal)),
                None => warn!(len = payload.len(), "ignoring unknown control packet"),
            }
            return;
        }
        if payload.is_empty() {
            return;
        }

        let plain = match self.ciphers.decrypt(class_of(priority), payload) {
            Ok(plain) => plain,
            Err(error) => {
                warn!(priority = priority.value(), %error, "packet decryption failed, resetting stream");
                if let Some(assembler) = self.assemblers.get_mut(&priority) {
                    assembler.reset();
                }
                out.push(Inbound::CipherError { priority, error });
                return;
            }
        };

        let assembler = self.assemblers.entry(priority).or_default();
        assembler.feed(&plain);
        while let Some(result) = assembler.drain() {
            match result {
                Ok(message) => {
                    debug!(
                        priority = priority.value(),
                        app = message.application_id,
                        msg = message.message_id,
                        "message assembled"
                    );
                    out.push(Inbound::Message { priority, message });
                }
                Err(error) => out.push(Inbound::ProtocolError { priority, error }),
            }
        }
    }

    /// Drops all partial packets and messages.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
        self.assemblers.clear();
    }

    /// Bytes held below the assembler layer.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}
