//! Abstract cipher interface for PriorityPacket payloads.
//!
//! Transports depend on `Arc<dyn PacketCipher>` and never see key material.
//! Packet headers are never passed through a cipher.

use crate::error::CryptoResult;
use std::fmt;
use std::sync::Arc;

/// Trait for encrypting/decrypting packet payloads.
pub trait PacketCipher: Send + Sync {
    /// Encrypts one packet payload.
    fn encrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypts a payload previously produced by `encrypt`.
    fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Number of bytes `encrypt` adds to a payload.
    ///
    /// Framers subtract this from the packet size limit before chunking.
    fn overhead(&self) -> usize {
        0
    }
}

/// No-op cipher for tests and unencrypted deployments.
/// Data passes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCipher;

impl PacketCipher for PassthroughCipher {
    fn encrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Payload class a cipher is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherClass {
    /// Reliable request/response traffic.
    Transactional,
    /// Best-effort streaming traffic.
    Streaming,
}

/// One optional cipher per payload class.
#[derive(Clone, Default)]
pub struct CipherSuite {
    transactional: Option<Arc<dyn PacketCipher>>,
    streaming: Option<Arc<dyn PacketCipher>>,
}

impl CipherSuite {
    /// A suite with no encryption for either class.
    pub fn none() -> Self {
        Self::default()
    }

    /// Installs the cipher for transactional payloads.
    pub fn with_transactional(mut self, cipher: Arc<dyn PacketCipher>) -> Self {
        self.transactional = Some(cipher);
        self
    }

    /// Installs the cipher for streaming payloads.
    pub fn with_streaming(mut self, cipher: Arc<dyn PacketCipher>) -> Self {
        self.streaming = Some(cipher);
        self
    }

    /// Returns the cipher for a class, if one is installed.
    pub fn for_class(&self, class: CipherClass) -> Option<&Arc<dyn PacketCipher>> {
        match class {
            CipherClass::Transactional => self.transactional.as_ref(),
            CipherClass::Streaming => self.streaming.as_ref(),
        }
    }

    /// Encrypts `data` for `class`, or copies it when no cipher is installed.
    pub fn encrypt(&self, class: CipherClass, data: &[u8]) -> CryptoResult<Vec<u8>> {
        match self.for_class(class) {
            Some(cipher) => cipher.encrypt(data),
            None => Ok(data.to_vec()),
        }
    }

    /// Decrypts `data` for `class`, or copies it when no cipher is installed.
    pub fn decrypt(&self, class: CipherClass, data: &[u8]) -> CryptoResult<Vec<u8>> {
        match self.for_class(class) {
            Some(cipher) => cipher.decrypt(data),
            None => Ok(data.to_vec()),
        }
    }

    /// Encryption overhead for `class` (0 without a cipher).
    pub fn overhead(&self, class: CipherClass) -> usize {
        self.for_class(class).map_or(0, |c| c.overhead())
    }
}

impl fmt::Debug for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSuite")
            .field("transactional", &self.transactional.is_some())
            .field("streaming", &self.streaming.is_some())
            .finish()
    }
}
