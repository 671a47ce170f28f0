//! `thinlink.toml` loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thinlink_cache::CacheConfig;
use thinlink_crypto::{AeadCipher, AeadKey, CipherSuite};
use thinlink_transport::TransportConfig;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "thinlink.toml";

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub cache: CacheConfig,
    pub crypto: CryptoConfig,
}

/// Packet encryption settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Hex-encoded ChaCha20-Poly1305 key. Packets travel in clear when absent.
    pub key: Option<String>,
}

impl AppConfig {
    /// Parses a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config")
    }

    /// Loads `path`, or `thinlink.toml` from the working directory if it
    /// exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Cipher suite for both packet classes.
    pub fn cipher_suite(&self) -> Result<CipherSuite> {
        let Some(key) = &self.crypto.key else {
            return Ok(CipherSuite::none());
        };
        let bytes = hex::decode(key.trim()).context("Crypto key is not valid hex")?;
        let key = AeadKey::from_slice(&bytes).context("Invalid crypto key")?;
        Ok(CipherSuite::none()
            .with_transactional(Arc::new(AeadCipher::new(&key)))
            .with_streaming(Arc::new(AeadCipher::new(&key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use thinlink_cache::CacheBackend;
    use thinlink_transport::ChannelKind;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn tables_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [transport]
            stream_addr = "10.0.0.1:7000"
            polling_url = "http://10.0.0.1/poll"
            preferred = "polling"
            retry_delay_ms = 250

            [cache]
            root = "/var/cache/thinlink"
            backend = "sqlite"
            "#,
        )
        .unwrap();

        assert_eq!(config.transport.stream_addr.as_deref(), Some("10.0.0.1:7000"));
        assert_eq!(config.transport.preferred, ChannelKind::Polling);
        assert_eq!(config.transport.retry_delay, Duration::from_millis(250));
        assert_eq!(
            config.transport.connect_timeout,
            TransportConfig::default().connect_timeout
        );
        assert_eq!(config.cache.root, PathBuf::from("/var/cache/thinlink"));
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.crypto.key, None);
    }

    #[test]
    fn load_reads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\nstream_addr = \"host:1\"").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.transport.stream_addr.as_deref(), Some("host:1"));
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn cipher_suite_from_key() {
        let mut config = AppConfig::default();
        assert!(config.cipher_suite().is_ok());

        config.crypto.key = Some("ab".repeat(32));
        assert!(config.cipher_suite().is_ok());

        config.crypto.key = Some("abcd".into());
        assert!(config.cipher_suite().is_err());

        config.crypto.key = Some("zz".repeat(32));
        assert!(config.cipher_suite().is_err());
    }
}
