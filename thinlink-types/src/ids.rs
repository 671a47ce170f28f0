//! Identifier types used throughout the thinlink core.
//!
//! All multi-byte integers are little-endian on the wire.

use crate::IdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of the canonical binary form of a [`CacheItemId`].
pub const CIID_LEN: usize = 14;

/// Length of the binary form of an [`EntityKey`].
pub const ENTITY_KEY_LEN: usize = 10;

/// Identity of a server-originated content item.
///
/// Equality is structural over all four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CacheItemId {
    pub item_id: u64,
    pub generator_id: u16,
    pub cache_id: u16,
    pub cluster_id: u16,
}

impl CacheItemId {
    /// Creates an id from its components.
    #[must_use]
    pub const fn new(item_id: u64, generator_id: u16, cache_id: u16, cluster_id: u16) -> Self {
        Self {
            item_id,
            generator_id,
            cache_id,
            cluster_id,
        }
    }

    /// Returns the 14-byte canonical binary form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CIID_LEN] {
        let mut out = [0u8; CIID_LEN];
        out[..8].copy_from_slice(&self.item_id.to_le_bytes());
        out[8..10].copy_from_slice(&self.generator_id.to_le_bytes());
        out[10..12].copy_from_slice(&self.cache_id.to_le_bytes());
        out[12..14].copy_from_slice(&self.cluster_id.to_le_bytes());
        out
    }

    /// Parses the canonical binary form. The slice must be exactly 14 bytes.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let bytes: &[u8; CIID_LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            expected: CIID_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self {
            item_id: u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            generator_id: u16::from_le_bytes([bytes[8], bytes[9]]),
            cache_id: u16::from_le_bytes([bytes[10], bytes[11]]),
            cluster_id: u16::from_le_bytes([bytes[12], bytes[13]]),
        })
    }

    /// Parses the dotted-hex string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        s.parse()
    }
}

impl fmt::Display for CacheItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016x}.{:04x}.{:04x}.{:04x}",
            self.item_id, self.generator_id, self.cache_id, self.cluster_id
        )
    }
}

impl FromStr for CacheItemId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [item, generator, cache, cluster] = parts.as_slice() else {
            return Err(IdError::InvalidFormat(format!(
                "expected 4 dot-separated components, got {}",
                parts.len()
            )));
        };
        let bad = |part: &str| IdError::InvalidFormat(format!("invalid hex component '{part}'"));
        Ok(Self {
            item_id: u64::from_str_radix(item, 16).map_err(|_| bad(item))?,
            generator_id: u16::from_str_radix(generator, 16).map_err(|_| bad(generator))?,
            cache_id: u16::from_str_radix(cache, 16).map_err(|_| bad(cache))?,
            cluster_id: u16::from_str_radix(cluster, 16).map_err(|_| bad(cluster))?,
        })
    }
}

impl Serialize for CacheItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Alternate cache key derived from entity type, application and item.
///
/// Used when a record has no [`CacheItemId`]. The application id embedded
/// here drives per-application purging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub entity_type: u16,
    pub application_id: i32,
    pub item_id: i32,
}

impl EntityKey {
    /// Creates a key from its components.
    #[must_use]
    pub const fn new(entity_type: u16, application_id: i32, item_id: i32) -> Self {
        Self {
            entity_type,
            application_id,
            item_id,
        }
    }

    /// Returns the 10-byte binary form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ENTITY_KEY_LEN] {
        let mut out = [0u8; ENTITY_KEY_LEN];
        out[..2].copy_from_slice(&self.entity_type.to_le_bytes());
        out[2..6].copy_from_slice(&self.application_id.to_le_bytes());
        out[6..10].copy_from_slice(&self.item_id.to_le_bytes());
        out
    }

    /// Decodes a key. The slice must be exactly 10 bytes.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != ENTITY_KEY_LEN {
            return Err(IdError::InvalidLength {
                expected: ENTITY_KEY_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            entity_type: u16::from_le_bytes([bytes[0], bytes[1]]),
            application_id: i32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            item_id: i32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.entity_type, self.application_id, self.item_id
        )
    }
}
