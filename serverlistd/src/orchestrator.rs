use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use shared::types::{address_equals, Address, RosterSnapshot, ServerInfo};
use crate::presenter::Presenter;
use crate::querier::Querier;
use crate::roster::{Roster, ServerRecord};

/// Where the addresses for a query cycle come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Fixed list from the config
    Whitelist,
    /// Addresses already in the roster
    CachedRoster,
    /// Fresh list from the master server
    Discovery,
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub whitelist: Option<Vec<Address>>,
    pub game_dir: Option<String>,
    pub blacklist: Vec<Address>,
    /// Minimum time between cycles that perform I/O
    pub query_interval: Duration,
    /// How long the roster may be re-queried before asking the master server again
    pub directory_query_interval: Duration,
    /// `None` keeps unresponsive servers forever
    pub max_unresponsive: Option<Duration>,
    pub max_total_query_time: Duration,
    pub max_directory_query_time: Duration,
}

/// Decides what to query each cycle and owns the resulting roster.
pub struct QueryOrchestrator {
    querier: Arc<dyn Querier>,
    settings: QuerySettings,
    roster: Roster,
    offline: usize,
    last_query: Option<Instant>,
    last_directory_query: Option<Instant>,
    last_mode: Option<QueryMode>,
}

/// Runs blocking querier work off the runtime threads.
/// A worker that panicked counts as an empty answer.
async fn offload<T, F>(what: &str, work: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::error!("{} worker failed: {}", what, e);
            None
        }
    }
}

impl QueryOrchestrator {
    pub fn new(querier: Arc<dyn Querier>, settings: QuerySettings) -> Result<Self> {
        let has_whitelist = settings.whitelist.as_ref().is_some_and(|list| !list.is_empty());
        if !has_whitelist && settings.game_dir.is_none() {
            bail!("You must have a whitelist or a game dir configured!");
        }

        Ok(Self {
            querier,
            settings,
            roster: Roster::new(),
            offline: 0,
            last_query: None,
            last_directory_query: None,
            last_mode: None,
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Whitelisted servers that did not answer in the last whitelist cycle
    pub fn offline_count(&self) -> usize {
        self.offline
    }

    pub fn last_mode(&self) -> Option<QueryMode> {
        self.last_mode
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            servers: self.roster.servers().iter().map(ServerRecord::to_view).collect(),
            offline: self.offline,
            updated_at: Utc::now(),
        }
    }

    /// Runs a query cycle if the query interval has passed.
    /// Returns whether the roster changed.
    pub async fn update(&mut self) -> bool {
        if !self.should_query(Instant::now()) {
            return false;
        }

        let fresh = self.query_new_list().await;
        self.last_query = Some(Instant::now());
        self.roster.update(fresh, self.settings.max_unresponsive)
    }

    fn should_query(&self, now: Instant) -> bool {
        match self.last_query {
            Some(last) => now.saturating_duration_since(last) >= self.settings.query_interval,
            None => true,
        }
    }

    fn should_query_last_list(&self, now: Instant) -> bool {
        if self.roster.is_empty() {
            return false;
        }
        match self.last_directory_query {
            Some(last) => {
                now.saturating_duration_since(last) <= self.settings.directory_query_interval
            }
            None => false,
        }
    }

    fn select_mode(&self, now: Instant) -> QueryMode {
        if self.settings.whitelist.as_ref().is_some_and(|list| !list.is_empty()) {
            QueryMode::Whitelist
        } else if self.should_query_last_list(now) {
            QueryMode::CachedRoster
        } else {
            QueryMode::Discovery
        }
    }

    fn is_blacklisted(&self, address: &Address) -> bool {
        self.settings
            .blacklist
            .iter()
            .any(|blacklisted| address_equals(blacklisted, address))
    }

    async fn query_new_list(&mut self) -> Vec<ServerInfo> {
        let mode = self.select_mode(Instant::now());
        self.last_mode = Some(mode);
        tracing::debug!("Query mode: {:?}", mode);

        match mode {
            QueryMode::Whitelist => {
                let whitelist = self.settings.whitelist.clone().unwrap_or_default();
                let expected = whitelist.len();
                let servers = self.query_servers(whitelist).await;
                self.offline = expected.saturating_sub(servers.len());
                servers
            }
            QueryMode::CachedRoster => {
                let addresses = self.roster.addresses();
                self.query_servers(addresses).await
            }
            QueryMode::Discovery => {
                let addresses = self.query_directory().await;
                let total = addresses.len();
                let addresses: Vec<Address> = addresses
                    .into_iter()
                    .filter(|address| !self.is_blacklisted(address))
                    .collect();
                if addresses.len() < total {
                    tracing::debug!("Skipped {} blacklisted servers", total - addresses.len());
                }
                self.last_directory_query = Some(Instant::now());

                self.query_servers(addresses).await
            }
        }
    }

    async fn query_servers(&self, addresses: Vec<Address>) -> Vec<ServerInfo> {
        let querier = Arc::clone(&self.querier);
        let budget = self.settings.max_total_query_time;
        offload("Server query", move || querier.query_servers(&addresses, budget))
            .await
            .unwrap_or_default()
    }

    async fn query_directory(&self) -> Vec<Address> {
        let Some(game_dir) = self.settings.game_dir.clone() else {
            return Vec::new();
        };
        let querier = Arc::clone(&self.querier);
        let budget = self.settings.max_directory_query_time;
        offload("Master server query", move || querier.query_directory(&game_dir, budget))
            .await
            .unwrap_or_default()
    }
}

/// Tick driver. Each tick awaits the previous update, so cycles never overlap.
/// Presenters see the roster after the first cycle and after every change.
pub async fn run(
    mut orchestrator: QueryOrchestrator,
    presenters: Vec<Box<dyn Presenter>>,
    tick: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut presented = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let changed = orchestrator.update().await;
                if changed {
                    tracing::debug!(
                        "Roster holds {} servers, {} offline",
                        orchestrator.roster().len(),
                        orchestrator.offline_count()
                    );
                }
                if changed || (!presented && orchestrator.last_mode().is_some()) {
                    let snapshot = orchestrator.snapshot();
                    for presenter in &presenters {
                        tracing::debug!("Presenting {} servers via {}", snapshot.servers.len(), presenter.name());
                        presenter.present(&snapshot);
                    }
                    presented = true;
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Query orchestrator shutting down");
                break;
            }
        }
    }

    Ok(())
}
