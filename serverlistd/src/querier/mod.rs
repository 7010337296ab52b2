pub mod steam;

use std::time::{Duration, Instant};
use shared::types::{Address, ServerInfo};

pub use steam::SteamQuerier;

/// Network side of the daemon. Both calls block and are best-effort:
/// failures are logged by the implementation and show up as missing
/// entries, never as errors.
pub trait Querier: Send + Sync {
    /// Query each address, returning the servers that answered within `budget`.
    fn query_servers(&self, addresses: &[Address], budget: Duration) -> Vec<ServerInfo>;

    /// List the addresses a directory service knows for `game_dir`.
    fn query_directory(&self, game_dir: &str, budget: Duration) -> Vec<Address>;
}

/// Runs `query_one` over `addresses` until the budget is spent.
///
/// The elapsed time is checked after each query, so at least one address is
/// always tried. Whatever was collected before the budget ran out is returned.
pub fn query_within_budget<F>(addresses: &[Address], budget: Duration, mut query_one: F) -> Vec<ServerInfo>
where
    F: FnMut(&Address) -> Option<ServerInfo>,
{
    let start = Instant::now();
    let mut servers = Vec::new();

    for address in addresses {
        if let Some(info) = query_one(address) {
            servers.push(info);
        }

        if start.elapsed() > budget {
            tracing::debug!(
                "Query budget of {:?} spent, {} of {} addresses answered",
                budget,
                servers.len(),
                addresses.len()
            );
            break;
        }
    }

    servers
}
