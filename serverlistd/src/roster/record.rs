use tokio::time::Instant;
use shared::types::{address_equals, Address, ServerInfo, ServerView};

/// Per-server state held in the roster.
#[derive(Debug, Clone)]
pub struct ServerRecord {
    pub info: ServerInfo,

    /// When the server first went missing from a query cycle
    unresponsive_since: Option<Instant>,
}

impl ServerRecord {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            unresponsive_since: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.info.address
    }

    /// Same server? Uses wildcard-port address equality.
    pub fn matches_identity(&self, other: &ServerInfo) -> bool {
        address_equals(&self.info.address, &other.address)
    }

    pub fn attributes_differ(&self, other: &ServerInfo) -> bool {
        self.info.player_count != other.player_count
            || self.info.max_players != other.max_players
            || self.info.name != other.name
            || self.info.map != other.map
    }

    pub fn copy_attributes_from(&mut self, other: &ServerInfo) {
        self.info.player_count = other.player_count;
        self.info.max_players = other.max_players;
        self.info.name.clone_from(&other.name);
        self.info.map.clone_from(&other.map);
    }

    /// Keeps the first failure time if already unresponsive.
    pub fn mark_unresponsive(&mut self, now: Instant) {
        if self.unresponsive_since.is_none() {
            self.unresponsive_since = Some(now);
        }
    }

    pub fn mark_responsive(&mut self) {
        self.unresponsive_since = None;
    }

    pub fn is_unresponsive(&self) -> bool {
        self.unresponsive_since.is_some()
    }

    pub fn unresponsive_since(&self) -> Option<Instant> {
        self.unresponsive_since
    }

    pub fn to_view(&self) -> ServerView {
        ServerView {
            address: self.info.address.to_string(),
            name: self.info.name.clone(),
            map: self.info.map.clone(),
            players: self.info.player_count,
            max_players: self.info.max_players,
            unresponsive: self.is_unresponsive(),
        }
    }
}
