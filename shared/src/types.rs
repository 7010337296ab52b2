use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// A game server endpoint.
///
/// Port 0 is a wildcard meaning "any port on this host". It only ever takes
/// part in comparisons and is never used to contact a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.port == 0
    }
}

/// Address equality where port 0 on either side matches any port on the same host.
pub fn address_equals(a: &Address, b: &Address) -> bool {
    a.host == b.host && (a.port == 0 || b.port == 0 || a.port == b.port)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("empty host in address {0:?}")]
    EmptyHost(String),
    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts `host` or `host:port`. A missing port becomes the wildcard.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (host, port) = match trimmed.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| AddressParseError::InvalidPort(s.to_string()))?;
                (host.trim(), port)
            }
            None => (trimmed, 0),
        };

        if host.is_empty() {
            return Err(AddressParseError::EmptyHost(s.to_string()));
        }

        Ok(Address::new(host, port))
    }
}

/// Status of a single server as reported by a querier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub address: Address,

    /// Human players only, bots are not counted
    pub player_count: u32,

    pub max_players: u32,

    pub name: String,

    pub map: String,
}

impl ServerInfo {
    /// A server with no players and empty name/map.
    pub fn empty(address: Address) -> Self {
        Self {
            address,
            player_count: 0,
            max_players: 0,
            name: String::new(),
            map: String::new(),
        }
    }
}

/// One server in a published roster snapshot.
/// Named fields are what listing templates can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerView {
    /// `host:port`, or bare host for wildcard addresses
    pub address: String,
    pub name: String,
    pub map: String,
    pub players: u32,
    pub max_players: u32,
    /// Missed at least one query cycle but not evicted yet
    pub unresponsive: bool,
}

/// Immutable copy of the roster handed to presenters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub servers: Vec<ServerView>,

    /// Whitelisted servers that did not answer in the last cycle
    pub offline: usize,

    pub updated_at: DateTime<Utc>,
}

impl Default for RosterSnapshot {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            offline: 0,
            updated_at: Utc::now(),
        }
    }
}
