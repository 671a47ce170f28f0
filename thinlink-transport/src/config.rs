//! Transport configuration.

use crate::selector::ChannelKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`TransportClient`](crate::TransportClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `host:port` of the stream carrier.
    pub stream_addr: Option<String>,
    /// URL the polling carrier POSTs to.
    pub polling_url: Option<String>,
    /// Carrier tried first on `connect`.
    pub preferred: ChannelKind,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Deadline for one polling round trip.
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    /// Idle time after which the polling carrier sends an empty request.
    #[serde(rename = "keepalive_interval_ms", with = "duration_ms")]
    pub keepalive_interval: Duration,
    /// Pause before a carrier is restarted after a failure.
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            stream_addr: None,
            polling_url: None,
            preferred: ChannelKind::Stream,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl TransportConfig {
    /// Stream address with the port replaced by a server-assigned one.
    pub fn stream_target(&self, alternate_port: Option<u16>) -> Option<String> {
        let addr = self.stream_addr.as_deref()?;
        Some(match alternate_port {
            Some(port) => match addr.rsplit_once(':') {
                Some((host, _)) => format!("{host}:{port}"),
                None => format!("{addr}:{port}"),
            },
            None => addr.to_string(),
        })
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
