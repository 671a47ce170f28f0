//! Transport client and its supervising task.
//!
//! The supervisor owns the selector and the active carrier. It restarts or
//! switches carriers on failure, forwards inbound messages to the
//! application callbacks and publishes state changes on a watch channel.

use crate::channel::{Carrier, ChannelContext, ChannelEvent};
use crate::config::TransportConfig;
use crate::error::{TransportError, TransportErrorCode, TransportResult};
use crate::outbox::Outbox;
use crate::polling::PollingChannel;
use crate::selector::{ChannelKind, SelectorDecision, TransportSelector};
use crate::session::{SessionSlot, SessionToken};
use crate::state::ChannelState;
use crate::stream::StreamChannel;
use std::sync::{Arc, Mutex, PoisonError};
use thinlink_crypto::CipherSuite;
use thinlink_protocol::Message;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Called with every inbound message.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Called with every transport failure.
pub type ErrorCallback = Arc<dyn Fn(TransportErrorCode) + Send + Sync>;

/// Called with `(old, new)` on every state change.
pub type StateCallback = Arc<dyn Fn(ChannelState, ChannelState) + Send + Sync>;

#[derive(Clone, Default)]
struct Callbacks {
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
    on_state: Option<StateCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientCommand {
    Connect,
    Suspend,
    Resume,
    Close,
}

/// Builder for [`TransportClient`].
pub struct TransportClientBuilder {
    config: TransportConfig,
    ciphers: CipherSuite,
    callbacks: Callbacks,
}

impl TransportClientBuilder {
    pub fn on_message(mut self, f: impl Fn(Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_transport_error(
        mut self,
        f: impl Fn(TransportErrorCode) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_state_changed(
        mut self,
        f: impl Fn(ChannelState, ChannelState) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_state = Some(Arc::new(f));
        self
    }

    /// Packet ciphers. Defaults to no encryption.
    pub fn ciphers(mut self, ciphers: CipherSuite) -> Self {
        self.ciphers = ciphers;
        self
    }

    /// Spawns the supervisor. Must be called inside a Tokio runtime.
    ///
    /// The client starts `Uninitialised`; call [`TransportClient::connect`].
    pub fn start(self) -> TransportClient {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Uninitialised);

        let outbox = Outbox::new();
        let session = SessionSlot::new();
        let nudge = Arc::new(Notify::new());

        let supervisor = Supervisor {
            config: Arc::new(self.config),
            ciphers: self.ciphers,
            callbacks: self.callbacks,
            outbox: outbox.clone(),
            session: session.clone(),
            nudge: nudge.clone(),
            alternate_port: Arc::new(Mutex::new(None)),
            events_tx,
            selector: TransportSelector::new(),
            epoch: 0,
            active: None,
            pending_retry: None,
            suspended_kind: None,
            state_tx,
        };
        tokio::spawn(supervisor.run(command_rx, events_rx));

        TransportClient {
            commands: command_tx,
            outbox,
            session,
            nudge,
            state: state_rx,
        }
    }
}

/// Handle to a running transport.
///
/// Dropping the handle stops the supervisor and the active carrier.
pub struct TransportClient {
    commands: mpsc::UnboundedSender<ClientCommand>,
    outbox: Outbox,
    session: SessionSlot,
    nudge: Arc<Notify>,
    state: watch::Receiver<ChannelState>,
}

impl TransportClient {
    pub fn builder(config: TransportConfig) -> TransportClientBuilder {
        TransportClientBuilder {
            config,
            ciphers: CipherSuite::none(),
            callbacks: Callbacks::default(),
        }
    }

    /// Encodes and queues a message. Returns its outbox sequence number.
    ///
    /// Never waits for I/O. Messages queued while disconnected are sent
    /// once a carrier is up.
    pub fn send_message(&self, message: &Message) -> TransportResult<u64> {
        if self.commands.is_closed() {
            return Err(TransportError::Closed);
        }
        let data = message.encode()?;
        let seq = self.outbox.enqueue(data);
        self.nudge.notify_one();
        debug!(
            seq,
            app = message.application_id,
            msg = message.message_id,
            "message queued"
        );
        Ok(seq)
    }

    fn command(&self, command: ClientCommand) -> TransportResult<()> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Closed)
    }

    /// Starts the preferred carrier. Resumes if suspended.
    pub fn connect(&self) -> TransportResult<()> {
        self.command(ClientCommand::Connect)
    }

    /// Stops the carrier but keeps the outbox and session.
    pub fn suspend(&self) -> TransportResult<()> {
        self.command(ClientCommand::Suspend)
    }

    pub fn resume(&self) -> TransportResult<()> {
        self.command(ClientCommand::Resume)
    }

    /// Stops the carrier and discards the outbox and session.
    pub fn close(&self) -> TransportResult<()> {
        self.command(ClientCommand::Close)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub fn session_token(&self) -> Option<SessionToken> {
        self.session.token()
    }
}

struct ActiveChannel {
    kind: ChannelKind,
    epoch: u64,
    task: JoinHandle<()>,
}

struct Supervisor {
    config: Arc<TransportConfig>,
    ciphers: CipherSuite,
    callbacks: Callbacks,
    outbox: Outbox,
    session: SessionSlot,
    nudge: Arc<Notify>,
    alternate_port: Arc<Mutex<Option<u16>>>,
    events_tx: mpsc::UnboundedSender<(u64, ChannelEvent)>,
    selector: TransportSelector,
    epoch: u64,
    active: Option<ActiveChannel>,
    /// Carrier to start once the retry delay has passed.
    pending_retry: Option<(Instant, ChannelKind)>,
    suspended_kind: Option<ChannelKind>,
    state_tx: watch::Sender<ChannelState>,
}

impl Supervisor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ClientCommand>,
        mut events: mpsc::UnboundedReceiver<(u64, ChannelEvent)>,
    ) {
        loop {
            let retry_at = self.pending_retry.map(|(at, _)| at);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some((epoch, event)) = events.recv() => {
                    self.handle_event(epoch, event);
                }
                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    if let Some((_, kind)) = self.pending_retry.take() {
                        self.spawn(kind);
                    }
                }
            }
        }

        debug!("transport client dropped, stopping supervisor");
        self.stop().await;
    }

    fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, new: ChannelState) {
        let old = self.state_tx.send_replace(new);
        if old == new {
            return;
        }
        info!(%old, %new, "transport state changed");
        if let Some(cb) = &self.callbacks.on_state {
            cb(old, new);
        }
    }

    fn report(&self, code: TransportErrorCode) {
        if let Some(cb) = &self.callbacks.on_error {
            cb(code);
        }
    }

    fn spawn(&mut self, kind: ChannelKind) {
        let carrier: Box<dyn Carrier> = match kind {
            ChannelKind::Stream => Box::new(StreamChannel),
            ChannelKind::Polling => Box::new(PollingChannel),
            ChannelKind::Exhausted => return,
        };

        self.epoch += 1;
        let ctx = ChannelContext {
            epoch: self.epoch,
            config: self.config.clone(),
            outbox: self.outbox.clone(),
            session: self.session.clone(),
            ciphers: self.ciphers.clone(),
            nudge: self.nudge.clone(),
            alternate_port: self.alternate_port.clone(),
            events: self.events_tx.clone(),
        };
        debug!(kind = %carrier.kind(), epoch = self.epoch, "starting carrier");
        self.active = Some(ActiveChannel {
            kind,
            epoch: self.epoch,
            task: tokio::spawn(carrier.run(ctx)),
        });
        self.set_state(ChannelState::Connecting);
    }

    /// Aborts the active carrier and returns its in-flight item to the
    /// queue.
    async fn stop(&mut self) -> Option<ChannelKind> {
        let active = self.active.take()?;
        active.task.abort();
        // Wait so the carrier cannot touch the outbox after the cancel
        let _ = active.task.await;
        self.outbox.cancel();
        debug!(kind = %active.kind, epoch = active.epoch, "carrier stopped");
        Some(active.kind)
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        debug!(?command, state = %self.state(), "transport command");
        match command {
            ClientCommand::Connect => match self.state() {
                ChannelState::Uninitialised => {
                    self.selector.reset();
                    self.spawn(self.config.preferred);
                }
                ChannelState::Suspended => self.resume(),
                _ => debug!("connect ignored, transport already active"),
            },
            ClientCommand::Suspend => {
                if !self.state().is_active() {
                    debug!("suspend ignored, transport not active");
                    return;
                }
                self.set_state(ChannelState::Suspending);
                let retry = self.pending_retry.take().map(|(_, kind)| kind);
                let stopped = self.stop().await;
                self.suspended_kind = stopped.or(retry).or(Some(self.config.preferred));
                self.set_state(ChannelState::Suspended);
            }
            ClientCommand::Resume => {
                if self.state() == ChannelState::Suspended {
                    self.resume();
                } else {
                    debug!("resume ignored, transport not suspended");
                }
            }
            ClientCommand::Close => {
                self.stop().await;
                self.pending_retry = None;
                self.suspended_kind = None;
                let dropped = self.outbox.clear();
                self.session.clear();
                *self.alternate_port.lock().unwrap_or_else(PoisonError::into_inner) = None;
                self.selector.reset();
                info!(dropped, "transport closed");
                self.set_state(ChannelState::Uninitialised);
            }
        }
    }

    fn resume(&mut self) {
        let kind = self.suspended_kind.take().unwrap_or(self.config.preferred);
        info!(%kind, "resuming transport");
        self.spawn(kind);
    }

    fn handle_event(&mut self, epoch: u64, event: ChannelEvent) {
        let current = self.active.as_ref().map(|a| a.epoch);
        if current != Some(epoch) {
            debug!(epoch, ?current, "ignoring event from replaced carrier");
            return;
        }

        match event {
            ChannelEvent::Connected => {
                self.selector.reset();
                self.set_state(ChannelState::Connected);
            }
            ChannelEvent::Message(message) => {
                if let Some(cb) = &self.callbacks.on_message {
                    cb(message);
                }
            }
            ChannelEvent::ProtocolError(error) => {
                debug!(%error, "inbound message dropped");
            }
            ChannelEvent::SendDropped { seq, reason } => {
                warn!(seq, %reason, "outbound message dropped");
                self.report(TransportErrorCode::SendFailed);
            }
            ChannelEvent::Failed(code) => self.handle_failure(code),
        }
    }

    fn handle_failure(&mut self, code: TransportErrorCode) {
        // The carrier has returned; its task is finishing on its own
        let Some(active) = self.active.take() else {
            return;
        };
        warn!(kind = %active.kind, %code, "carrier failed");
        self.report(code);
        self.set_state(ChannelState::Disconnected);

        match code {
            TransportErrorCode::DisconnectRequired => {
                self.session.clear();
                self.selector.reset();
                info!("server ended the session");
                self.set_state(ChannelState::Uninitialised);
            }
            TransportErrorCode::ReconnectRequired => {
                self.spawn(active.kind);
            }
            TransportErrorCode::NoConnectionData
            | TransportErrorCode::LostConnection
            | TransportErrorCode::SendFailed => {
                let decision = self.selector.next();
                debug!(?decision, retries = self.selector.retries_remaining(), "failover decision");
                match decision {
                    SelectorDecision::RetryCurrent => {
                        self.pending_retry =
                            Some((Instant::now() + self.config.retry_delay, active.kind));
                    }
                    SelectorDecision::SwitchTo(kind) => {
                        info!(from = %active.kind, to = %kind, "switching carrier");
                        self.spawn(kind);
                    }
                    SelectorDecision::GiveUp => {
                        if code != TransportErrorCode::NoConnectionData {
                            self.report(TransportErrorCode::NoConnectionData);
                        }
                        self.selector.reset();
                        warn!(queued = self.outbox.len(), "all carriers failed, giving up");
                        self.set_state(ChannelState::Uninitialised);
                    }
                }
            }
        }
    }
}
