//! Packet encryption capability for thinlink transports.
//!
//! The transport core treats encryption as an injected capability: it asks a
//! [`PacketCipher`] to transform PriorityPacket payloads and never looks at
//! the algorithm. One cipher may be installed per priority class through a
//! [`CipherSuite`]; an absent cipher means the class travels in clear.
//!
//! [`AeadCipher`] is a ready-made ChaCha20-Poly1305 implementation for
//! deployments that do not bring their own.

mod aead;
mod cipher;
mod error;

pub use aead::{AeadCipher, AeadKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use cipher::{CipherClass, CipherSuite, PacketCipher, PassthroughCipher};
pub use error::{CryptoError, CryptoResult};
