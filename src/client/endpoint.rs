//! Endpoint parsing
//!
//! Supports formats:
//! * wss://host
//! * wss://host:port
//! * wss://host[:port]/path[?query]
//! * wss://[ipv6]:port/path

use crate::connection::ConnectionConfig;
use crate::protocol::constants::{DEFAULT_PORT, DEFAULT_TARGET, SCHEME};
use crate::{Error, Result};

/// Parsed endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server host (brackets stripped for IPv6 literals)
    pub host: String,
    /// Server port
    pub port: u16,
    /// Resource path, including any query string
    pub target: String,
}

/// Split `host[:port]` where host may be a bracketed IPv6 literal
fn split_host_port(host_port: &str) -> Result<(String, u16)> {
    if let Some(rest) = host_port.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config("unterminated IPv6 literal in endpoint".into()))?;
        let port = match after {
            "" => DEFAULT_PORT,
            p => parse_port(
                p.strip_prefix(':')
                    .ok_or_else(|| Error::Config("invalid endpoint authority".into()))?,
            )?,
        };
        return Ok((host.to_string(), port));
    }

    match host_port.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((host_port.to_string(), DEFAULT_PORT)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Config(format!("invalid port '{}'", port))),
        Ok(p) => Ok(p),
    }
}

impl Endpoint {
    /// Parse a `wss://` endpoint URL
    ///
    /// # Examples
    ///
    /// ```
    /// use globalchat_wire::client::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("wss://chat.example.com:8443/ws").unwrap();
    /// assert_eq!(endpoint.host, "chat.example.com");
    /// assert_eq!(endpoint.port, 8443);
    /// assert_eq!(endpoint.target, "/ws");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let prefix = format!("{}://", SCHEME);
        let rest = s
            .strip_prefix(&prefix)
            .ok_or_else(|| Error::Config(format!("endpoint must start with {}", prefix)))?;

        // Target starts at the first '/' or '?' after the authority
        let (host_port, target) = match rest.find(['/', '?']) {
            Some(pos) => {
                let (hp, t) = rest.split_at(pos);
                let target = if t.starts_with('?') {
                    format!("/{}", t)
                } else {
                    t.to_string()
                };
                (hp, target)
            }
            None => (rest, DEFAULT_TARGET.to_string()),
        };

        if host_port.contains('@') {
            return Err(Error::Config("credentials are not supported in endpoints".into()));
        }

        let (host, port) = split_host_port(host_port)?;
        if host.is_empty() {
            return Err(Error::Config("endpoint has no host".into()));
        }

        Ok(Self { host, port, target })
    }

    /// Convert to ConnectionConfig
    pub fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig::builder(&self.host)
            .port(self.port)
            .target(&self.target)
            .build()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == DEFAULT_PORT {
            write!(f, "{}://{}{}", SCHEME, host, self.target)
        } else {
            write!(f, "{}://{}:{}{}", SCHEME, host, self.port, self.target)
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let endpoint = Endpoint::parse("wss://localhost:9443/chat").unwrap();
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 9443);
        assert_eq!(endpoint.target, "/chat");
    }

    #[test]
    fn test_parse_minimal() {
        let endpoint = Endpoint::parse("wss://chat.example.com").unwrap();
        assert_eq!(endpoint.host, "chat.example.com");
        assert_eq!(endpoint.port, 443);
        assert_eq!(endpoint.target, "/");
    }

    #[test]
    fn test_parse_query_without_path() {
        let endpoint = Endpoint::parse("wss://chat.example.com?room=eu").unwrap();
        assert_eq!(endpoint.target, "/?room=eu");
    }

    #[test]
    fn test_parse_ipv6_literal() {
        let endpoint = Endpoint::parse("wss://[::1]:9443/").unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 9443);

        let endpoint = Endpoint::parse("wss://[::1]").unwrap();
        assert_eq!(endpoint.port, 443);
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(Endpoint::parse("ws://localhost").is_err());
        assert!(Endpoint::parse("https://localhost").is_err());
        assert!(Endpoint::parse("localhost:443").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Endpoint::parse("wss://localhost:0/").is_err());
        assert!(Endpoint::parse("wss://localhost:99999/").is_err());
        assert!(Endpoint::parse("wss://localhost:abc/").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_host_and_credentials() {
        assert!(Endpoint::parse("wss:///chat").is_err());
        assert!(Endpoint::parse("wss://user:pw@localhost/").is_err());
    }

    #[test]
    fn test_display_omits_default_port() {
        let endpoint: Endpoint = "wss://chat.example.com:443/ws".parse().unwrap();
        assert_eq!(endpoint.to_string(), "wss://chat.example.com/ws");

        let endpoint: Endpoint = "wss://[::1]:9443/".parse().unwrap();
        assert_eq!(endpoint.to_string(), "wss://[::1]:9443/");
    }

    #[test]
    fn test_to_config() {
        let config = Endpoint::parse("wss://localhost:9443/chat")
            .unwrap()
            .to_config();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9443);
        assert_eq!(config.target, "/chat");
    }
}
