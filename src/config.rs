use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::client::ClientError;

/// Upper bound for one response unless configured otherwise (one 8 KiB receive).
pub const DEFAULT_MAX_RESPONSE: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Plain,
    Tls,
}

/// Where to connect. Supplied once per invocation and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub transport: Transport,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16, transport: Transport) -> Self {
        Self { host: host.into(), port, transport }
    }

    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, Transport::Plain)
    }

    pub fn tls(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, Transport::Tls)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_tls(&self) -> bool {
        self.transport == Transport::Tls
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Only `Required` exists: a TLS peer must always present a chain we trust.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    #[default]
    Required,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TlsTrustConfig {
    #[serde(default)]
    pub verify_mode: VerifyMode,
    pub ca_bundle_path: PathBuf,
    #[serde(default = "default_check_hostname")]
    pub check_hostname: bool,
    /// Name for SNI and the certificate name check. Falls back to the target host.
    #[serde(default)]
    pub server_name: Option<String>,
}

fn default_check_hostname() -> bool {
    true
}

impl TlsTrustConfig {
    pub fn new(ca_bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            verify_mode: VerifyMode::Required,
            ca_bundle_path: ca_bundle_path.into(),
            check_hostname: true,
            server_name: None,
        }
    }

    /// Disabling the name check keeps chain validation but accepts any
    /// certificate subject. Insecure outside of compatibility testing.
    pub fn with_check_hostname(mut self, check_hostname: bool) -> Self {
        self.check_hostname = check_hostname;
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn verify_mode(&self) -> VerifyMode {
        self.verify_mode
    }

    pub fn ca_bundle_path(&self) -> &Path {
        &self.ca_bundle_path
    }

    pub fn check_hostname(&self) -> bool {
        self.check_hostname
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }
}

/// How the single response is collected.
///
/// `Single` mirrors one `recv` call: whatever the first read returns, so a
/// fragmented or oversized reply is cut short. The other modes keep
/// reading, bounded by `max_response_bytes`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    #[default]
    Single,
    ToClose,
    UntilDelimiter(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub target: ConnectionTarget,
    #[serde(default)]
    pub trust: Option<TlsTrustConfig>,
    #[serde(default)]
    pub read_mode: ReadMode,
    #[serde(default = "default_max_response")]
    pub max_response_bytes: usize,
    #[serde(default)]
    pub no_delay: bool,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub io_timeout_ms: Option<u64>,
}

fn default_max_response() -> usize {
    DEFAULT_MAX_RESPONSE
}

// Sub-millisecond deadlines round up so they never turn into 0 ms.
fn ceil_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl ClientConfig {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            trust: None,
            read_mode: ReadMode::Single,
            max_response_bytes: DEFAULT_MAX_RESPONSE,
            no_delay: false,
            connect_timeout_ms: None,
            io_timeout_ms: None,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ClientError::Config(format!("invalid config file {}: {e}", path.display()))
        })
    }

    pub fn with_trust(mut self, trust: TlsTrustConfig) -> Self {
        self.trust = Some(trust);
        self
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(ceil_millis(timeout));
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout_ms = Some(ceil_millis(timeout));
        self
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn trust(&self) -> Option<&TlsTrustConfig> {
        self.trust.as_ref()
    }

    pub fn read_mode(&self) -> &ReadMode {
        &self.read_mode
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }

    pub fn no_delay(&self) -> bool {
        self.no_delay
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    /// Rejects combinations that can never produce a valid exchange.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.target.host.is_empty() {
            return Err(ClientError::Config("target host is empty".into()));
        }
        if self.max_response_bytes == 0 {
            return Err(ClientError::Config("max_response_bytes must be greater than zero".into()));
        }
        if let ReadMode::UntilDelimiter(delimiter) = &self.read_mode {
            if delimiter.is_empty() {
                return Err(ClientError::Config("read delimiter is empty".into()));
            }
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(ClientError::Config("connect_timeout_ms must be greater than zero".into()));
        }
        if self.io_timeout_ms == Some(0) {
            return Err(ClientError::Config("io_timeout_ms must be greater than zero".into()));
        }
        if self.target.is_tls() && self.trust.is_none() {
            return Err(ClientError::Config(format!(
                "{} uses TLS but no trust configuration (CA bundle) was given",
                self.target
            )));
        }
        Ok(())
    }
}
