//! Hand-off from the orchestrator to whatever shows the roster.
//!
//! Presenters get an immutable [`RosterSnapshot`] after every update that
//! changed something. Rendering into a title/description/entries listing is
//! shared by the log presenter and the HTTP API.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use shared::types::{RosterSnapshot, ServerView};
use crate::config::PresenterConfig;

pub trait Presenter: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    fn present(&self, snapshot: &RosterSnapshot);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub upper: String,
    pub lower: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub title: String,
    pub description: String,
    pub entries: Vec<ListingEntry>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.description)?;
        for entry in &self.entries {
            writeln!(f)?;
            writeln!(f, "{}", entry.upper)?;
            writeln!(f, "{}", entry.lower)?;
        }
        Ok(())
    }
}

/// Substitutes `{name}`, `{address}`, `{map}`, `{players}` and
/// `{max_players}`. Unknown placeholders are kept verbatim.
pub fn fill_template(template: &str, server: &ServerView) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = &after[..close];
        match key {
            "name" => out.push_str(&server.name),
            "address" => out.push_str(&server.address),
            "map" => out.push_str(&server.map),
            "players" => out.push_str(&server.players.to_string()),
            "max_players" => out.push_str(&server.max_players.to_string()),
            _ => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

#[derive(Debug, Clone)]
pub struct ListingFormat {
    pub config: PresenterConfig,
    pub query_interval: Duration,
}

impl ListingFormat {
    /// Busiest servers first, at most `max_entries` of them.
    pub fn render(&self, snapshot: &RosterSnapshot) -> Listing {
        let mut servers: Vec<&ServerView> = snapshot.servers.iter().collect();
        servers.sort_by(|a, b| b.players.cmp(&a.players));

        let mut description = format!("{} server(s) online", servers.len());
        if snapshot.offline > 0 {
            description.push_str(&format!(", {} offline", snapshot.offline));
        }
        description.push_str(&format!(
            "\nUpdating every {:.0} seconds",
            self.query_interval.as_secs_f64()
        ));

        let entries = servers
            .into_iter()
            .take(self.config.max_entries.max(1))
            .map(|srv| ListingEntry {
                upper: fill_template(&self.config.upper_format, srv),
                lower: fill_template(&self.config.lower_format, srv),
            })
            .collect();

        Listing {
            title: self.config.title.clone(),
            description,
            entries,
        }
    }
}

/// Writes the rendered listing to the log.
pub struct LogPresenter {
    format: ListingFormat,
}

impl LogPresenter {
    pub fn new(format: ListingFormat) -> Self {
        Self { format }
    }
}

impl Presenter for LogPresenter {
    fn name(&self) -> &'static str {
        "log"
    }

    fn present(&self, snapshot: &RosterSnapshot) {
        tracing::info!("Server list:\n{}", self.format.render(snapshot));
    }
}

/// Publishes snapshots to a watch channel read by the HTTP API.
pub struct SnapshotPublisher {
    tx: watch::Sender<RosterSnapshot>,
}

impl SnapshotPublisher {
    pub fn new(tx: watch::Sender<RosterSnapshot>) -> Self {
        Self { tx }
    }
}

impl Presenter for SnapshotPublisher {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn present(&self, snapshot: &RosterSnapshot) {
        // No receivers just means the API is not running.
        self.tx.send_replace(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn view(name: &str, players: u32) -> ServerView {
        ServerView {
            address: format!("127.0.0.1:{}", 27000 + players),
            name: name.to_string(),
            map: "de_dust2".to_string(),
            players,
            max_players: 24,
            unresponsive: false,
        }
    }

    fn format(max_entries: usize) -> ListingFormat {
        ListingFormat {
            config: PresenterConfig {
                title: "Servers".to_string(),
                max_entries,
                upper_format: "{name}".to_string(),
                lower_format: "{players}/{max_players} on {map} ({address})".to_string(),
            },
            query_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_fill_template() {
        let srv = view("Main", 5);
        assert_eq!(
            fill_template("{name} {players}/{max_players} {map} {address}", &srv),
            "Main 5/24 de_dust2 127.0.0.1:27005"
        );
        assert_eq!(fill_template("{unknown} {name", &srv), "{unknown} {name");
    }

    #[test]
    fn test_fill_template_does_not_expand_values() {
        let srv = view("{map}", 1);
        assert_eq!(fill_template("{name}", &srv), "{map}");
    }

    #[test]
    fn test_render_sorts_and_caps() {
        let snapshot = RosterSnapshot {
            servers: vec![view("Quiet", 1), view("Busy", 20), view("Mid", 7)],
            offline: 0,
            updated_at: Utc::now(),
        };

        let listing = format(2).render(&snapshot);

        assert_eq!(listing.title, "Servers");
        assert_eq!(listing.description, "3 server(s) online\nUpdating every 30 seconds");
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.entries[0].upper, "Busy");
        assert_eq!(listing.entries[1].upper, "Mid");
        assert_eq!(listing.entries[0].lower, "20/24 on de_dust2 (127.0.0.1:27020)");
    }

    #[test]
    fn test_render_offline_count() {
        let snapshot = RosterSnapshot {
            servers: vec![view("Only", 1)],
            offline: 2,
            updated_at: Utc::now(),
        };

        let listing = format(5).render(&snapshot);
        assert!(listing.description.starts_with("1 server(s) online, 2 offline\n"));
    }

    #[test]
    fn test_snapshot_publisher() {
        let (tx, rx) = watch::channel(RosterSnapshot::default());
        let publisher = SnapshotPublisher::new(tx);

        let snapshot = RosterSnapshot {
            servers: vec![view("Only", 1)],
            offline: 1,
            updated_at: Utc::now(),
        };
        publisher.present(&snapshot);

        assert_eq!(rx.borrow().servers, snapshot.servers);
        assert_eq!(rx.borrow().offline, 1);
    }
}
