//! Channel state machine.

use std::fmt;

/// Lifecycle state of the transport.
///
/// `Uninitialised → Connecting → Connected`; failures move to
/// `Disconnected`; `Suspending → Suspended` pauses without losing queued
/// data; `close` always returns to `Uninitialised`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    #[default]
    Uninitialised,
    Connecting,
    Connected,
    Disconnected,
    Suspending,
    Suspended,
}

impl ChannelState {
    /// Whether a carrier is running or about to be restarted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Disconnected)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialised => "uninitialised",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Suspending => "suspending",
            Self::Suspended => "suspended",
        };
        f.write_str(s)
    }
}
