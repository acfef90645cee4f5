//! `host:port` connection strings.
//!
//! Game servers advertise themselves, and reuse tickets travel through the
//! queue, as a bare `"host:port"` string. That string is parsed into a
//! [`ConnectionEndpoint`] as soon as it crosses into the control plane and
//! is never passed around raw.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EndpointParseError;

/// Address a client connects to in order to join a game server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionEndpoint {
    pub host: String,
    pub port: String,
}

impl ConnectionEndpoint {
    /// Parse a `"host:port"` string.
    ///
    /// The delimiter is the first colon. Exactly one delimiter is allowed
    /// and both sides must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, EndpointParseError> {
        let (host, port) = raw
            .split_once(':')
            .ok_or_else(|| EndpointParseError::MissingDelimiter(raw.to_string()))?;

        if port.contains(':') {
            return Err(EndpointParseError::ExtraDelimiter(raw.to_string()));
        }
        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(raw.to_string()));
        }
        if port.is_empty() {
            return Err(EndpointParseError::EmptyPort(raw.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port: port.to_string(),
        })
    }

    /// Wire form used for reuse tickets.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl FromStr for ConnectionEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
