use std::time::Duration;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tokio::runtime::Handle;
use shared::protocol::{FILTER_GAMEADDR, FILTER_GAMEDIR, STEAM_SERVER_LIST_URL};
use shared::types::{address_equals, Address, ServerInfo};
use crate::querier::{query_within_budget, Querier};

#[derive(Debug, Deserialize)]
struct ServerListResponse {
    #[serde(default)]
    response: ServerListBody,
}

#[derive(Debug, Default, Deserialize)]
struct ServerListBody {
    #[serde(default)]
    servers: Vec<SteamServer>,
}

/// One entry of `IGameServersService/GetServerList`
#[derive(Debug, Clone, Deserialize)]
struct SteamServer {
    addr: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    map: String,
    #[serde(default)]
    players: u32,
    #[serde(default)]
    max_players: u32,
    #[serde(default)]
    bots: u32,
}

impl SteamServer {
    fn address(&self) -> Option<Address> {
        match self.addr.parse::<Address>() {
            Ok(address) => Some(address),
            Err(e) => {
                tracing::debug!("Skipping server list entry: {}", e);
                None
            }
        }
    }

    /// Bots are not counted as players.
    fn into_info(self, address: Address) -> ServerInfo {
        ServerInfo {
            address,
            player_count: self.players.saturating_sub(self.bots),
            max_players: self.max_players,
            name: self.name,
            map: self.map,
        }
    }
}

fn parse_server_list(body: &str) -> Result<Vec<SteamServer>> {
    let parsed: ServerListResponse = serde_json::from_str(body)
        .context("Failed to parse server list response")?;
    Ok(parsed.response.servers)
}

fn directory_addresses(servers: &[SteamServer]) -> Vec<Address> {
    servers.iter().filter_map(SteamServer::address).collect()
}

/// Picks the entry answering for `queried`. A wildcard query takes the
/// concrete address the API reported.
fn server_for(queried: &Address, servers: Vec<SteamServer>) -> Option<ServerInfo> {
    servers.into_iter().find_map(|srv| {
        let reported = srv.address()?;
        if !address_equals(queried, &reported) {
            return None;
        }
        let address = if queried.is_wildcard() { reported } else { queried.clone() };
        Some(srv.into_info(address))
    })
}

/// Queries server status and the master list through the Steam Web API.
///
/// The trait is blocking, so requests are driven on the runtime handle the
/// querier was created on. Call it from `spawn_blocking`, never from a task.
pub struct SteamQuerier {
    client: Client,
    handle: Handle,
    webapi_key: String,
    directory_limit: u32,
}

impl SteamQuerier {
    /// Must be called from inside a tokio runtime.
    pub fn new(webapi_key: String, request_timeout: Duration, directory_limit: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("serverlistd/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let handle = Handle::try_current()
            .context("Steam querier needs a running tokio runtime")?;

        Ok(Self {
            client,
            handle,
            webapi_key,
            directory_limit,
        })
    }

    fn fetch(&self, filter: &str, limit: u32, timeout: Option<Duration>) -> Result<Vec<SteamServer>> {
        self.handle.block_on(async {
            let limit = limit.to_string();
            let mut request = self.client.get(STEAM_SERVER_LIST_URL).query(&[
                ("key", self.webapi_key.as_str()),
                ("filter", filter),
                ("limit", limit.as_str()),
            ]);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let body = request
                .send()
                .await
                .context("Server list request failed")?
                .error_for_status()
                .context("Server list request rejected")?
                .text()
                .await
                .context("Failed to read server list response")?;

            parse_server_list(&body)
        })
    }

    fn query_server(&self, address: &Address) -> Option<ServerInfo> {
        tracing::debug!("Querying server {}...", address);

        let filter = format!("{}{}", FILTER_GAMEADDR, address);
        match self.fetch(&filter, 1, None) {
            Ok(servers) => {
                let info = server_for(address, servers);
                if info.is_none() {
                    tracing::info!("Couldn't contact server {}.", address);
                }
                info
            }
            Err(e) => {
                tracing::error!("Connection error querying server {}: {:#}", address, e);
                None
            }
        }
    }
}

impl Querier for SteamQuerier {
    fn query_servers(&self, addresses: &[Address], budget: Duration) -> Vec<ServerInfo> {
        tracing::info!("Querying {} servers...", addresses.len());
        query_within_budget(addresses, budget, |address| self.query_server(address))
    }

    fn query_directory(&self, game_dir: &str, budget: Duration) -> Vec<Address> {
        tracing::info!("Querying master server list for {}...", game_dir);

        let filter = format!("{}{}", FILTER_GAMEDIR, game_dir);
        match self.fetch(&filter, self.directory_limit, Some(budget)) {
            Ok(servers) => directory_addresses(&servers),
            Err(e) => {
                tracing::error!("Connection error querying master server: {:#}", e);
                Vec::new()
            }
        }
    }
}
