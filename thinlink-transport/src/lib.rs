//! Interchangeable carriers for thinlink messages.
//!
//! A [`TransportClient`] queues encoded messages in an [`Outbox`] and moves
//! them over one of two carriers: a persistent TCP stream, or HTTP polling
//! when the stream is unavailable. Both carriers share the bucket framing
//! in [`bucket`], the session token and the outbox, so a failover loses
//! nothing that was queued. The [`TransportSelector`] decides when to retry
//! and when to switch.

pub mod bucket;
mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod outbox;
mod polling;
pub mod selector;
pub mod session;
pub mod state;
mod stream;

pub use bucket::{encode_bucket, BucketDecoder, ControlSignal, Inbound};
pub use client::{
    ErrorCallback, MessageCallback, StateCallback, TransportClient, TransportClientBuilder,
};
pub use config::TransportConfig;
pub use error::{TransportError, TransportErrorCode, TransportResult};
pub use outbox::{Outbox, OutboxItem};
pub use selector::{ChannelKind, SelectorDecision, TransportSelector, INITIAL_RETRIES};
pub use session::{SessionSlot, SessionToken, NO_SESSION, SESSION_TOKEN_LEN};
pub use state::ChannelState;
