//! Client configuration.
//!
//! Settings live in `~/.config/hublink/config.toml` by default:
//!
//! ```toml
//! [connection]
//! transport = "tcp"
//! endpoints = ["tcp://hub-a.example.com:8080", "tcp://hub-b.example.com:8080"]
//! connect_timeout = 10
//!
//! [requests]
//! timeout = 30000
//!
//! [credentials]
//! identity = "alice@example.com/laptop"
//! password = "env::HUBLINK_PASSWORD"
//! ```
//!
//! The file is turned into [`ClientOptions`], the runtime settings the
//! [`Client`](crate::Client) is built with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::secret;
use crate::transport::TransportKind;

/// Default connect timeout, in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default reply timeout of command helpers, in milliseconds.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connection: ConnectionSettings,
    pub requests: RequestSettings,
    pub credentials: CredentialSettings,
}

/// `[connection]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Transport used to reach the endpoints.
    pub transport: TransportKind,

    /// Candidate endpoint URLs; one is picked at random per attempt.
    /// Empty means the identity's domain on the default port.
    pub endpoints: Vec<String>,

    /// Connect and login timeout in seconds.
    pub connect_timeout: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            endpoints: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// `[requests]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Reply timeout of command helpers, in milliseconds.
    pub timeout: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// `[credentials]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Identity (`user@domain/resource`).
    pub identity: Option<String>,

    /// Password; supports `env::` and `pass::` references.
    pub password: Option<String>,
}

/// Resolved credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content).map_err(|e| ClientError::config(format!("invalid config: {e}")))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hublink")
            .join("config.toml")
    }

    /// Resolves the `[credentials]` section, expanding secret references.
    pub fn credentials(&self) -> ClientResult<Credentials> {
        let identity = self
            .credentials
            .identity
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ClientError::config("credentials.identity is not set"))?;
        let password = match &self.credentials.password {
            Some(value) => secret::resolve(value)?,
            None => String::new(),
        };
        Ok(Credentials { identity, password })
    }

    /// Builds runtime options from the file settings.
    pub fn options(&self) -> ClientOptions {
        ClientOptions::default()
            .with_transport(self.connection.transport)
            .with_endpoints(self.connection.endpoints.clone())
            .with_connect_timeout(Duration::from_secs(self.connection.connect_timeout))
            .with_request_timeout(Duration::from_millis(self.requests.timeout))
    }
}

/// Runtime settings of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub transport: TransportKind,
    pub endpoints: Vec<String>,
    pub connect_timeout: Duration,
    /// Reply timeout used by the command helpers and `request`.
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            endpoints: Vec::new(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl ClientOptions {
    /// Builder: set the transport kind.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Builder: set the candidate endpoints.
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set the reply timeout of command helpers.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reply timeout in whole milliseconds, never below one.
    pub(crate) fn request_timeout_ms(&self) -> u64 {
        u64::try_from(self.request_timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}
