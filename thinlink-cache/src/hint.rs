//! Cache hint bitmask sent by the server alongside cacheable content.

use crate::store::CacheMode;
use std::fmt;
use std::ops::BitOr;

/// Bitmask describing how a value may be cached.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CacheHint(u8);

impl CacheHint {
    pub const NONE: CacheHint = CacheHint(0);
    /// Cache for the lifetime of the process.
    pub const SESSION: CacheHint = CacheHint(0x01);
    /// Cache across restarts.
    pub const PERSISTENT: CacheHint = CacheHint(0x02);
    pub const GUARANTEED: CacheHint = CacheHint(0x04);
    pub const BACK_STACK_ONLY: CacheHint = CacheHint(0x08);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: CacheHint) -> bool {
        self.0 & other.0 == other.0
    }

    /// Storage mode implied by the hint. Persistent wins over Session;
    /// `None` means the value must not be cached.
    pub fn cache_mode(self) -> Option<CacheMode> {
        if self.contains(Self::PERSISTENT) {
            Some(CacheMode::Persistent)
        } else if self.contains(Self::SESSION) {
            Some(CacheMode::Session)
        } else {
            None
        }
    }
}

impl BitOr for CacheHint {
    type Output = CacheHint;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<u8> for CacheHint {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for CacheHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(CacheHint, &str); 4] = [
            (CacheHint::SESSION, "SESSION"),
            (CacheHint::PERSISTENT, "PERSISTENT"),
            (CacheHint::GUARANTEED, "GUARANTEED"),
            (CacheHint::BACK_STACK_ONLY, "BACK_STACK_ONLY"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "CacheHint(NONE)")
        } else {
            write!(f, "CacheHint({})", set.join(" | "))
        }
    }
}
