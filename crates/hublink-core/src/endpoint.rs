//! Server endpoints.
//!
//! Endpoints are configured as URLs. Stream endpoints carry a host and port
//! (`tcp://hub.example.com:8080`, `http://hub.example.com/`), local endpoints
//! a socket path (`unix:///run/hublink.sock`). When several candidates are
//! configured, one is picked uniformly at random per connection attempt.

use std::fmt;
use std::path::PathBuf;

use rand::Rng;
use thiserror::Error;
use url::Url;

/// Port used when an endpoint does not name one.
pub const DEFAULT_PORT: u16 = 8080;

/// Errors raised while parsing an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The value is not a URL.
    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL scheme is not supported.
    #[error("unsupported endpoint scheme {0:?}")]
    UnsupportedScheme(String),

    /// A stream endpoint without a host.
    #[error("endpoint {0:?} has no host")]
    MissingHost(String),

    /// A unix endpoint without a socket path.
    #[error("endpoint {0:?} has no socket path")]
    MissingPath(String),
}

/// A resolved server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A host/port pair reached over TCP.
    Stream {
        host: String,
        port: u16,
        path: Option<String>,
    },
    /// A unix domain socket.
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Creates a stream endpoint.
    pub fn stream(host: impl Into<String>, port: u16) -> Self {
        Self::Stream {
            host: host.into(),
            port,
            path: None,
        }
    }

    /// Creates a unix socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Parses an endpoint URL.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(input.trim()).map_err(|e| EndpointError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "unix" => {
                if matches!(url.path(), "" | "/") {
                    return Err(EndpointError::MissingPath(input.to_string()));
                }
                let path = url
                    .to_file_path()
                    .map_err(|()| EndpointError::MissingPath(input.to_string()))?;
                Ok(Self::unix(path))
            }
            "tcp" | "http" | "https" | "ws" | "wss" => {
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| EndpointError::MissingHost(input.to_string()))?;
                let path = match url.path() {
                    "" | "/" => None,
                    p => Some(p.to_string()),
                };
                Ok(Self::Stream {
                    host: host.to_string(),
                    port: url.port_or_known_default().unwrap_or(DEFAULT_PORT),
                    path,
                })
            }
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Returns the `host:port` address of a stream endpoint.
    pub fn socket_addr(&self) -> Option<String> {
        match self {
            Self::Stream { host, port, .. } => Some(format!("{host}:{port}")),
            Self::Unix { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { host, port, path } => {
                write!(f, "tcp://{host}:{port}{}", path.as_deref().unwrap_or(""))
            }
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Picks one endpoint uniformly at random from `candidates`.
///
/// With no candidates the endpoint is `fallback_host` on [`DEFAULT_PORT`].
pub fn pick_endpoint(candidates: &[String], fallback_host: &str) -> Result<Endpoint, EndpointError> {
    if candidates.is_empty() {
        return Ok(Endpoint::stream(fallback_host, DEFAULT_PORT));
    }

    let index = rand::thread_rng().gen_range(0..candidates.len());
    Endpoint::parse(&candidates[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tcp_endpoint() {
        let ep = Endpoint::parse("tcp://hub.example.com:5222").unwrap();
        assert_eq!(ep, Endpoint::stream("hub.example.com", 5222));
        assert_eq!(ep.socket_addr().as_deref(), Some("hub.example.com:5222"));
    }

    #[test]
    fn parse_http_endpoint_uses_scheme_port_and_keeps_path() {
        let ep = Endpoint::parse("http://localhost/hub").unwrap();
        assert_eq!(
            ep,
            Endpoint::Stream {
                host: "localhost".to_string(),
                port: 80,
                path: Some("/hub".to_string()),
            }
        );
    }

    #[test]
    fn parse_tcp_without_port_uses_default() {
        let ep = Endpoint::parse("tcp://localhost").unwrap();
        assert_eq!(ep, Endpoint::stream("localhost", DEFAULT_PORT));
    }

    #[test]
    fn parse_unix_endpoint() {
        let ep = Endpoint::parse("unix:///run/hublink.sock").unwrap();
        assert_eq!(ep, Endpoint::unix("/run/hublink.sock"));
        assert!(ep.socket_addr().is_none());
        assert_eq!(ep.to_string(), "unix:///run/hublink.sock");
    }

    #[cfg(unix)]
    #[test]
    fn unix_path_is_percent_decoded() {
        let ep = Endpoint::parse("unix:///tmp/my dir/hub.sock").unwrap();
        assert_eq!(ep, Endpoint::unix("/tmp/my dir/hub.sock"));

        let ep = Endpoint::parse("unix:///tmp/caf%C3%A9/hub.sock").unwrap();
        assert_eq!(ep, Endpoint::unix("/tmp/café/hub.sock"));
    }

    #[test]
    fn parse_rejects_bad_endpoints() {
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(EndpointError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Endpoint::parse("ftp://hub:21"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Endpoint::parse("unix:///"),
            Err(EndpointError::MissingPath(_))
        ));
    }

    #[test]
    fn pick_falls_back_to_domain() {
        let ep = pick_endpoint(&[], "hub.example.com").unwrap();
        assert_eq!(ep, Endpoint::stream("hub.example.com", DEFAULT_PORT));
    }

    #[test]
    fn pick_returns_one_of_the_candidates() {
        let candidates = vec![
            "tcp://a.example.com:1".to_string(),
            "tcp://b.example.com:2".to_string(),
            "tcp://c.example.com:3".to_string(),
        ];
        let parsed: Vec<Endpoint> = candidates
            .iter()
            .map(|c| Endpoint::parse(c).unwrap())
            .collect();

        for _ in 0..32 {
            let ep = pick_endpoint(&candidates, "unused").unwrap();
            assert!(parsed.contains(&ep));
        }
    }
}
