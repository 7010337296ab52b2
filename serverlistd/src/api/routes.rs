use std::sync::Arc;
use std::time::Duration;
use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use shared::protocol::API_PREFIX;
use shared::types::RosterSnapshot;
use crate::orchestrator::QueryMode;
use crate::presenter::ListingFormat;
use crate::roster::hash;

#[derive(Clone)]
pub struct AppState {
    pub snapshot_rx: watch::Receiver<RosterSnapshot>,
    pub format: Arc<ListingFormat>,
    pub info: Arc<ConfigResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    /// Mode implied by the config. Discovery setups also refresh from the
    /// roster between master server queries.
    pub configured_mode: QueryMode,
    pub game_dir: Option<String>,
    pub query_interval_secs: f64,
    pub directory_query_interval_secs: f64,
    /// `None` when unresponsive servers are never evicted
    pub max_unresponsive_secs: Option<f64>,
}

impl ConfigResponse {
    pub fn new(
        configured_mode: QueryMode,
        game_dir: Option<String>,
        query_interval: Duration,
        directory_query_interval: Duration,
        max_unresponsive: Option<Duration>,
    ) -> Self {
        Self {
            configured_mode,
            game_dir,
            query_interval_secs: query_interval.as_secs_f64(),
            directory_query_interval_secs: directory_query_interval.as_secs_f64(),
            max_unresponsive_secs: max_unresponsive.map(|d| d.as_secs_f64()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/config", API_PREFIX), get(get_config))
        .route(&format!("{}/servers", API_PREFIX), get(get_servers))
        .route(&format!("{}/servers/hash", API_PREFIX), get(get_hash))
        .route(&format!("{}/listing", API_PREFIX), get(get_listing))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(state.info.as_ref().clone())
}

async fn get_servers(State(state): State<AppState>) -> Json<RosterSnapshot> {
    Json(state.snapshot_rx.borrow().clone())
}

async fn get_hash(State(state): State<AppState>) -> String {
    hash::compute_hash(&state.snapshot_rx.borrow())
}

async fn get_listing(State(state): State<AppState>) -> String {
    let listing = state.format.render(&state.snapshot_rx.borrow());
    listing.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_response_names_configured_mode() {
        let info = ConfigResponse::new(
            QueryMode::Discovery,
            Some("cstrike".to_string()),
            Duration::from_secs(30),
            Duration::from_secs(100),
            None,
        );

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["configured_mode"], "discovery");
        assert!(json.get("mode").is_none());
        assert_eq!(json["query_interval_secs"], 30.0);
        assert!(json["max_unresponsive_secs"].is_null());
    }
}
