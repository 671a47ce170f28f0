//! Plumbing shared by the carriers.
//!
//! Each carrier runs as one coordinator task. It owns its socket or HTTP
//! client, its `BucketDecoder` and its timers, and reports to the client's
//! supervisor through `ChannelEvent`s tagged with the epoch it was started
//! under. Events from a replaced carrier are ignored by the supervisor.

use crate::bucket::{BucketDecoder, ControlSignal, Inbound};
use crate::config::TransportConfig;
use crate::error::TransportErrorCode;
use crate::outbox::Outbox;
use crate::selector::ChannelKind;
use crate::session::SessionSlot;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use thinlink_crypto::CipherSuite;
use thinlink_protocol::{Message, ProtocolError};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What a carrier reports to the supervisor.
#[derive(Debug)]
pub(crate) enum ChannelEvent {
    Connected,
    Message(Message),
    ProtocolError(ProtocolError),
    /// An outbox item could not be framed and was dropped. Reported to the
    /// application as `SendFailed`.
    SendDropped { seq: u64, reason: String },
    /// The carrier stopped. Its in-flight item, if any, was cancelled.
    Failed(TransportErrorCode),
}

pub(crate) type EventSender = mpsc::UnboundedSender<(u64, ChannelEvent)>;

/// Everything a carrier needs, cloned per spawn.
#[derive(Clone)]
pub(crate) struct ChannelContext {
    pub epoch: u64,
    pub config: Arc<TransportConfig>,
    pub outbox: Outbox,
    pub session: SessionSlot,
    pub ciphers: CipherSuite,
    /// Signalled when the outbox gains an item.
    pub nudge: Arc<Notify>,
    /// Port the server asked the stream carrier to use instead.
    pub alternate_port: Arc<Mutex<Option<u16>>>,
    pub events: EventSender,
}

impl ChannelContext {
    pub fn emit(&self, event: ChannelEvent) {
        // Receiver gone means the client is shutting down
        let _ = self.events.send((self.epoch, event));
    }

    /// Cancels any in-flight item and reports the failure.
    pub fn fail(&self, code: TransportErrorCode) {
        self.outbox.cancel();
        self.emit(ChannelEvent::Failed(code));
    }

    pub fn decoder(&self) -> BucketDecoder {
        BucketDecoder::new(self.ciphers.clone())
    }

    pub fn alternate_port(&self) -> Option<u16> {
        *self.alternate_port.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_alternate_port(&self, port: u16) {
        *self.alternate_port.lock().unwrap_or_else(PoisonError::into_inner) = Some(port);
    }

    /// Delivers decoded traffic. Returns the error code when a control
    /// signal ends the carrier.
    pub fn dispatch(&self, inbound: Vec<Inbound>) -> Option<TransportErrorCode> {
        for unit in inbound {
            match unit {
                Inbound::Message { message, .. } => self.emit(ChannelEvent::Message(message)),
                Inbound::ProtocolError { priority, error } => {
                    warn!(priority = priority.value(), %error, "dropping undecodable message");
                    self.emit(ChannelEvent::ProtocolError(error));
                }
                Inbound::CipherError { priority, error } => {
                    warn!(priority = priority.value(), %error, "dropping undecryptable packet");
                }
                Inbound::Control(ControlSignal::AlternatePort(port)) => {
                    info!(port, "server requested reconnect on alternate port");
                    self.set_alternate_port(port);
                    return Some(TransportErrorCode::ReconnectRequired);
                }
                Inbound::Control(ControlSignal::Disconnect) => {
                    info!("server requested disconnect");
                    return Some(TransportErrorCode::DisconnectRequired);
                }
            }
        }
        None
    }
}

/// A carrier implementation.
#[async_trait]
pub(crate) trait Carrier: Send {
    fn kind(&self) -> ChannelKind;

    /// Runs until the carrier fails or its task is aborted. Must report
    /// exactly one `Failed` event before returning.
    async fn run(self: Box<Self>, ctx: ChannelContext);
}

/// Aborts a helper task when dropped, so aborting a coordinator also
/// stops the tasks it spawned.
pub(crate) struct AbortOnDrop<T>(pub JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
