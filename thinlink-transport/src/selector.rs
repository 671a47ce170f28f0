//! Retry and fallback policy. Pure, no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Retries granted to each carrier kind before switching.
pub const INITIAL_RETRIES: u8 = 3;

/// Carrier kinds, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Stream,
    Polling,
    /// Every kind has been tried.
    Exhausted,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stream => "stream",
            Self::Polling => "polling",
            Self::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// What to do after a carrier failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorDecision {
    RetryCurrent,
    SwitchTo(ChannelKind),
    GiveUp,
}

/// Retry counter plus the last kind switched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSelector {
    retries_remaining: u8,
    last_kind: Option<ChannelKind>,
}

impl Default for TransportSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportSelector {
    pub fn new() -> Self {
        Self {
            retries_remaining: INITIAL_RETRIES,
            last_kind: None,
        }
    }

    pub fn retries_remaining(&self) -> u8 {
        self.retries_remaining
    }

    pub fn last_kind(&self) -> Option<ChannelKind> {
        self.last_kind
    }

    /// Consumes a retry, or switches to the next kind once retries run out.
    ///
    /// Switch order is Stream, then Polling, then give up. Each switch
    /// restores the retry budget. Once exhausted, every call gives up.
    pub fn next(&mut self) -> SelectorDecision {
        if self.last_kind == Some(ChannelKind::Exhausted) {
            return SelectorDecision::GiveUp;
        }
        if self.retries_remaining > 0 {
            self.retries_remaining -= 1;
            return SelectorDecision::RetryCurrent;
        }

        let next = match self.last_kind {
            None => ChannelKind::Stream,
            Some(ChannelKind::Stream) => ChannelKind::Polling,
            Some(ChannelKind::Polling | ChannelKind::Exhausted) => ChannelKind::Exhausted,
        };
        self.last_kind = Some(next);
        self.retries_remaining = INITIAL_RETRIES;
        match next {
            ChannelKind::Exhausted => SelectorDecision::GiveUp,
            kind => SelectorDecision::SwitchTo(kind),
        }
    }

    /// Returns to the initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
