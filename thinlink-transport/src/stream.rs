//! Persistent-socket carrier.
//!
//! On connect the client writes its 6-byte session token (zeros when it
//! has none), fused with the first queued bucket if there is one. The
//! server's first 6 bytes are the session token it assigns. After that
//! both directions carry buckets.

use crate::bucket::encode_bucket;
use crate::channel::{AbortOnDrop, Carrier, ChannelContext, ChannelEvent};
use crate::error::TransportErrorCode;
use crate::selector::ChannelKind;
use crate::session::{SessionToken, SESSION_TOKEN_LEN};
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 8 * 1024;

/// Stream carrier over `tokio::net::TcpStream`.
pub(crate) struct StreamChannel;

/// Outcome of draining the outbox onto the socket.
enum Flush {
    Idle,
    Failed,
}

impl StreamChannel {
    /// Writes queued items one at a time: peek, write, commit.
    async fn flush_outbox(
        ctx: &ChannelContext,
        writer: &mut OwnedWriteHalf,
        mut preamble: Option<SessionToken>,
    ) -> Flush {
        loop {
            let Some(item) = ctx.outbox.peek_next() else {
                if let Some(token) = preamble.take() {
                    if let Err(e) = writer.write_all(&token).await {
                        warn!(error = %e, "session preamble write failed");
                        return Flush::Failed;
                    }
                }
                return Flush::Idle;
            };

            let bucket = match encode_bucket(&item.data, &ctx.ciphers) {
                Ok(bucket) => bucket,
                Err(e) => {
                    ctx.outbox.commit();
                    ctx.emit(ChannelEvent::SendDropped {
                        seq: item.seq,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let frame = match preamble.take() {
                Some(token) => {
                    let mut frame = Vec::with_capacity(SESSION_TOKEN_LEN + bucket.len());
                    frame.extend_from_slice(&token);
                    frame.extend_from_slice(&bucket);
                    frame
                }
                None => bucket,
            };

            match writer.write_all(&frame).await {
                Ok(()) => {
                    ctx.outbox.commit();
                    debug!(seq = item.seq, bytes = frame.len(), "stream bucket sent");
                }
                Err(e) => {
                    warn!(seq = item.seq, error = %e, "stream write failed");
                    return Flush::Failed;
                }
            }
        }
    }
}

async fn read_loop(
    mut reader: tokio::net::tcp::OwnedReadHalf,
    tx: mpsc::Sender<io::Result<Vec<u8>>>,
) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let result = match reader.read(&mut buf).await {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "server closed stream")),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) => Err(e),
        };
        let done = result.is_err();
        if tx.send(result).await.is_err() || done {
            return;
        }
    }
}

#[async_trait]
impl Carrier for StreamChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Stream
    }

    async fn run(self: Box<Self>, ctx: ChannelContext) {
        let Some(addr) = ctx.config.stream_target(ctx.alternate_port()) else {
            debug!("no stream address configured");
            ctx.fail(TransportErrorCode::NoConnectionData);
            return;
        };

        let stream = match timeout(ctx.config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(%addr, error = %e, "stream connect failed");
                ctx.fail(TransportErrorCode::LostConnection);
                return;
            }
            Err(_) => {
                warn!(%addr, "stream connect timed out");
                ctx.fail(TransportErrorCode::LostConnection);
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable nagle");
        }
        info!(%addr, "stream connected");

        let (reader, mut writer) = stream.into_split();
        let (read_tx, mut read_rx) = mpsc::channel(16);
        let _reader = AbortOnDrop(tokio::spawn(read_loop(reader, read_tx)));

        if let Flush::Failed = Self::flush_outbox(&ctx, &mut writer, Some(ctx.session.get())).await {
            ctx.fail(TransportErrorCode::LostConnection);
            return;
        }
        ctx.emit(ChannelEvent::Connected);

        let mut decoder = ctx.decoder();
        let mut token = Vec::with_capacity(SESSION_TOKEN_LEN);

        loop {
            tokio::select! {
                chunk = read_rx.recv() => {
                    let mut data = match chunk {
                        Some(Ok(data)) => data,
                        Some(Err(e)) => {
                            warn!(error = %e, "stream read failed");
                            ctx.fail(TransportErrorCode::LostConnection);
                            return;
                        }
                        None => {
                            ctx.fail(TransportErrorCode::LostConnection);
                            return;
                        }
                    };

                    if token.len() < SESSION_TOKEN_LEN {
                        let take = (SESSION_TOKEN_LEN - token.len()).min(data.len());
                        token.extend(data.drain(..take));
                        if token.len() == SESSION_TOKEN_LEN {
                            let mut assigned = [0u8; SESSION_TOKEN_LEN];
                            assigned.copy_from_slice(&token);
                            ctx.session.set(assigned);
                            debug!("session token assigned");
                        }
                    }

                    if !data.is_empty() {
                        if let Some(code) = ctx.dispatch(decoder.feed(&data)) {
                            ctx.fail(code);
                            return;
                        }
                    }
                }
                _ = ctx.nudge.notified() => {}
            }

            if let Flush::Failed = Self::flush_outbox(&ctx, &mut writer, None).await {
                ctx.fail(TransportErrorCode::LostConnection);
                return;
            }
        }
    }
}
