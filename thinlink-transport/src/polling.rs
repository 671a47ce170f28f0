//! Request/response carrier.
//!
//! Every round trip POSTs `token ‖ bucket`, where the bucket carries at
//! most one outbox item (or nothing, for a keepalive trigger). The
//! response body starts with the session token; a body of exactly six zero
//! bytes means "no data, keep the session". Anything shorter, or a failed
//! request, is a lost connection.

use crate::bucket::encode_bucket;
use crate::channel::{AbortOnDrop, Carrier, ChannelContext, ChannelEvent};
use crate::error::{TransportError, TransportErrorCode, TransportResult};
use crate::selector::ChannelKind;
use crate::session::{SessionToken, NO_SESSION, SESSION_TOKEN_LEN};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Polling carrier over `reqwest`.
pub(crate) struct PollingChannel;

/// Response from one round trip, tagged with the request number.
type RoundTrip = (u64, TransportResult<Vec<u8>>);

struct InFlight {
    request: u64,
    deadline: Instant,
    /// Whether an outbox item rides on this request.
    carries_item: bool,
    _task: AbortOnDrop<()>,
}

/// What a response body contains.
#[derive(Debug, PartialEq, Eq)]
enum Reply<'a> {
    /// Exactly the all-zero token.
    NoData,
    Data { token: SessionToken, bucket: &'a [u8] },
}

fn parse_reply(body: &[u8]) -> TransportResult<Reply<'_>> {
    if body.len() < SESSION_TOKEN_LEN {
        return Err(TransportError::InvalidResponse(format!(
            "{} byte body is shorter than the session token",
            body.len()
        )));
    }
    let (head, bucket) = body.split_at(SESSION_TOKEN_LEN);
    let mut token = NO_SESSION;
    token.copy_from_slice(head);
    if token == NO_SESSION && bucket.is_empty() {
        Ok(Reply::NoData)
    } else {
        Ok(Reply::Data { token, bucket })
    }
}

async fn post(client: reqwest::Client, url: String, body: Vec<u8>) -> TransportResult<Vec<u8>> {
    let response = client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
        .body(body)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Http(format!("status {status}")));
    }
    Ok(response.bytes().await?.to_vec())
}

impl PollingChannel {
    fn start_request(
        ctx: &ChannelContext,
        client: &reqwest::Client,
        url: &str,
        request: u64,
        results: &mpsc::UnboundedSender<RoundTrip>,
    ) -> InFlight {
        let mut body = ctx.session.get().to_vec();
        let mut carries_item = false;
        while let Some(item) = ctx.outbox.peek_next() {
            match encode_bucket(&item.data, &ctx.ciphers) {
                Ok(bucket) => {
                    body.extend_from_slice(&bucket);
                    carries_item = true;
                    debug!(seq = item.seq, request, "polling request carries item");
                    break;
                }
                Err(e) => {
                    ctx.outbox.commit();
                    ctx.emit(ChannelEvent::SendDropped {
                        seq: item.seq,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let tx = results.clone();
        let client = client.clone();
        let url = url.to_string();
        let task = tokio::spawn(async move {
            let result = post(client, url, body).await;
            let _ = tx.send((request, result));
        });
        InFlight {
            request,
            deadline: Instant::now() + ctx.config.request_timeout,
            carries_item,
            _task: AbortOnDrop(task),
        }
    }
}

#[async_trait]
impl Carrier for PollingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Polling
    }

    async fn run(self: Box<Self>, ctx: ChannelContext) {
        let Some(url) = ctx.config.polling_url.clone() else {
            debug!("no polling url configured");
            ctx.fail(TransportErrorCode::NoConnectionData);
            return;
        };
        let client = match reqwest::Client::builder()
            .connect_timeout(ctx.config.connect_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "failed to build http client");
                ctx.fail(TransportErrorCode::LostConnection);
                return;
            }
        };

        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<RoundTrip>();
        let mut decoder = ctx.decoder();
        let mut connected = false;
        let mut next_request = 0u64;

        let period = ctx.config.keepalive_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First round trip establishes the session
        let mut in_flight = Some(Self::start_request(&ctx, &client, &url, next_request, &results_tx));
        next_request += 1;

        loop {
            let deadline = in_flight.as_ref().map(|f| f.deadline);
            let idle = in_flight.is_none();

            tokio::select! {
                Some((request, result)) = results_rx.recv() => {
                    let Some(current) = in_flight.take_if(|f| f.request == request) else {
                        continue;
                    };
                    keepalive.reset();

                    let body = match result {
                        Ok(body) => body,
                        Err(e) => {
                            warn!(request, error = %e, "polling request failed");
                            ctx.fail(TransportErrorCode::LostConnection);
                            return;
                        }
                    };
                    let reply = match parse_reply(&body) {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!(request, error = %e, "invalid polling response");
                            ctx.fail(TransportErrorCode::LostConnection);
                            return;
                        }
                    };

                    if current.carries_item {
                        ctx.outbox.commit();
                    }
                    if !connected {
                        connected = true;
                        info!(%url, "polling connected");
                        ctx.emit(ChannelEvent::Connected);
                    }

                    let mut more = false;
                    if let Reply::Data { token, bucket } = reply {
                        if token != NO_SESSION {
                            ctx.session.set(token);
                        }
                        if !bucket.is_empty() {
                            more = true;
                            if let Some(code) = ctx.dispatch(decoder.feed(bucket)) {
                                ctx.fail(code);
                                return;
                            }
                        }
                    }

                    // Server had data: ask again straight away
                    if more || !ctx.outbox.is_empty() {
                        in_flight = Some(Self::start_request(&ctx, &client, &url, next_request, &results_tx));
                        next_request += 1;
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    warn!(timeout = ?ctx.config.request_timeout, "polling request timed out");
                    // Dropping the in-flight request aborts it
                    in_flight = None;
                    ctx.fail(TransportErrorCode::LostConnection);
                    return;
                }
                _ = ctx.nudge.notified(), if idle => {
                    in_flight = Some(Self::start_request(&ctx, &client, &url, next_request, &results_tx));
                    next_request += 1;
                }
                _ = keepalive.tick(), if idle => {
                    debug!("polling keepalive");
                    in_flight = Some(Self::start_request(&ctx, &client, &url, next_request, &results_tx));
                    next_request += 1;
                }
            }
        }
    }
}
