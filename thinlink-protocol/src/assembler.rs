//! Reassembles messages from a per-priority byte stream.
//!
//! Packets of one priority arrive in order, but message boundaries do not
//! line up with packet boundaries. The assembler buffers bytes, parses the
//! message header once enough are present, and hands out each message when
//! its declared size has arrived.

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{decode_with_header, peek_header, Message, MessageHeader};
use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

/// Streaming message reassembler for one priority.
#[derive(Debug, Default)]
pub struct PacketAssembler {
    buffer: BytesMut,
    /// Header of the message at the front of `buffer`, parsed once.
    header: Option<MessageHeader>,
    /// Header-level failure waiting to be reported by `drain`.
    failure: Option<ProtocolError>,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to the stream.
    pub fn feed(&mut self, data: &[u8]) {
        if self.failure.is_some() {
            // Stream is unsynchronised until the error is drained
            return;
        }
        self.buffer.extend_from_slice(data);
        self.parse_header();
    }

    fn parse_header(&mut self) {
        if self.header.is_some() || self.failure.is_some() {
            return;
        }
        match peek_header(&self.buffer) {
            Ok(Some(header)) => {
                debug!(
                    size = header.size,
                    app = header.application_id,
                    msg = header.message_id,
                    "message header parsed"
                );
                self.header = Some(header);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, buffered = self.buffer.len(), "discarding unparseable stream");
                self.buffer.clear();
                self.failure = Some(e);
            }
        }
    }

    /// Whether a full message, or a pending failure, is ready to drain.
    pub fn is_complete(&self) -> bool {
        self.failure.is_some()
            || self
                .header
                .is_some_and(|h| self.buffer.len() >= h.size)
    }

    /// Declared size of the message being assembled, once known.
    pub fn expected_size(&self) -> Option<usize> {
        self.header.map(|h| h.size)
    }

    /// Takes the next complete message off the stream.
    ///
    /// Returns `None` while more bytes are needed. A message that fails to
    /// decode still has its bytes removed, so the following message is
    /// unaffected.
    pub fn drain(&mut self) -> Option<ProtocolResult<Message>> {
        if let Some(e) = self.failure.take() {
            return Some(Err(e));
        }
        let header = self.header?;
        if self.buffer.len() < header.size {
            return None;
        }

        let result = decode_with_header(&header, &self.buffer[..header.size]);
        self.buffer.advance(header.size);
        self.header = None;
        self.parse_header();
        Some(result)
    }

    /// Discards all buffered state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.header = None;
        self.failure = None;
    }

    /// Number of bytes held.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
