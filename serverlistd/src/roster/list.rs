use std::time::Duration;
use tokio::time::Instant;
use shared::types::{Address, ServerInfo};
use crate::roster::record::ServerRecord;

/// The set of servers currently tracked, in insertion order.
#[derive(Debug, Default)]
pub struct Roster {
    servers: Vec<ServerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_servers(servers: impl IntoIterator<Item = ServerInfo>) -> Self {
        Self {
            servers: servers.into_iter().map(ServerRecord::new).collect(),
        }
    }

    pub fn servers(&self) -> &[ServerRecord] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.servers.iter().map(|srv| srv.address().clone()).collect()
    }

    /// Merge a freshly queried batch. Returns true if a server was inserted,
    /// had its attributes changed, or was evicted.
    ///
    /// `max_unresponsive` of `None` keeps missing servers forever.
    pub fn update(&mut self, fresh: Vec<ServerInfo>, max_unresponsive: Option<Duration>) -> bool {
        self.update_at(fresh, max_unresponsive, Instant::now())
    }

    pub fn update_at(
        &mut self,
        fresh: Vec<ServerInfo>,
        max_unresponsive: Option<Duration>,
        now: Instant,
    ) -> bool {
        // Held servers missing from the batch. Insertions only append, so
        // these indices stay valid until eviction.
        let not_found: Vec<usize> = self
            .servers
            .iter()
            .enumerate()
            .filter(|(_, srv)| !fresh.iter().any(|new_srv| srv.matches_identity(new_srv)))
            .map(|(idx, _)| idx)
            .collect();

        let mut insert = Vec::new();
        let mut updated = 0usize;

        for new_srv in fresh {
            match self.servers.iter_mut().find(|srv| srv.matches_identity(&new_srv)) {
                Some(srv) => {
                    srv.mark_responsive();
                    if srv.attributes_differ(&new_srv) {
                        srv.copy_attributes_from(&new_srv);
                        updated += 1;
                    }
                }
                None => insert.push(ServerRecord::new(new_srv)),
            }
        }

        let inserted = insert.len();
        self.servers.extend(insert);

        let mut evict = vec![false; self.servers.len()];
        let mut removed = 0usize;

        for idx in not_found {
            let srv = &mut self.servers[idx];
            srv.mark_unresponsive(now);

            let (Some(limit), Some(since)) = (max_unresponsive, srv.unresponsive_since()) else {
                continue;
            };
            if now.saturating_duration_since(since) > limit {
                tracing::info!(
                    "Removing unresponsive server {} ({}) from list.",
                    srv.address(),
                    srv.info.name
                );
                evict[idx] = true;
                removed += 1;
            }
        }

        if removed > 0 {
            let mut idx = 0;
            self.servers.retain(|_| {
                let keep = !evict[idx];
                idx += 1;
                keep
            });
        }

        if updated > 0 || removed > 0 || inserted > 0 {
            tracing::info!(
                "New: {} | Removed: {} | Updated: {} servers",
                inserted,
                removed,
                updated
            );
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srv(host: &str, port: u16) -> ServerInfo {
        ServerInfo::empty(Address::new(host, port))
    }

    fn srv_with(host: &str, port: u16, players: u32) -> ServerInfo {
        ServerInfo {
            address: Address::new(host, port),
            player_count: players,
            max_players: 12,
            name: "name".to_string(),
            map: "map".to_string(),
        }
    }

    #[test]
    fn test_update_unchanged() {
        let mut roster = Roster::from_servers([srv("127.0.0.1", 27015), srv("127.0.0.2", 27015)]);

        let changed = roster.update(
            vec![srv("127.0.0.1", 27015), srv("127.0.0.2", 27015)],
            Some(Duration::ZERO),
        );
        assert!(!changed, "Identical batch should not report change");
    }

    #[test]
    fn test_update_empty_roster() {
        let mut roster = Roster::new();

        assert!(roster.update(vec![srv("127.0.0.1", 27015)], Some(Duration::ZERO)));
        assert_eq!(roster.addresses(), vec![Address::new("127.0.0.1", 27015)]);
    }

    #[test]
    fn test_update_idempotent() {
        let mut roster = Roster::new();
        let now = Instant::now();
        let batch = vec![srv_with("127.0.0.1", 27015, 4), srv_with("127.0.0.2", 27015, 8)];

        assert!(roster.update_at(batch.clone(), None, now));
        assert!(!roster.update_at(batch, None, now));
        assert_eq!(roster.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_unresponsive_evicted_after_threshold() {
        let mut roster = Roster::from_servers([srv("127.0.0.1", 27015)]);
        let threshold = Some(Duration::from_millis(100));

        assert!(!roster.update(vec![], threshold));
        assert_eq!(roster.len(), 1);
        assert!(roster.servers()[0].is_unresponsive());

        tokio::time::advance(Duration::from_millis(300)).await;

        assert!(roster.update(vec![], threshold));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_update_eviction_boundary() {
        let mut roster = Roster::from_servers([srv("127.0.0.1", 27015)]);
        let threshold = Duration::from_secs(10);
        let start = Instant::now();

        assert!(!roster.update_at(vec![], Some(threshold), start));
        assert!(!roster.update_at(vec![], Some(threshold), start + Duration::from_secs(9)));
        assert!(!roster.update_at(vec![], Some(threshold), start + threshold));
        assert_eq!(roster.len(), 1);

        let changed = roster.update_at(
            vec![],
            Some(threshold),
            start + threshold + Duration::from_millis(1),
        );
        assert!(changed);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_update_eviction_disabled() {
        let mut roster = Roster::from_servers([srv("127.0.0.1", 27015)]);
        let start = Instant::now();

        assert!(!roster.update_at(vec![], None, start));
        assert!(!roster.update_at(vec![], None, start + Duration::from_secs(3600)));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.servers()[0].unresponsive_since(), Some(start));
    }

    #[test]
    fn test_update_responsive_again_is_not_a_change() {
        let mut roster = Roster::from_servers([srv("127.0.0.1", 27015)]);
        let start = Instant::now();
        let threshold = Some(Duration::from_secs(60));

        roster.update_at(vec![], threshold, start);
        assert!(roster.servers()[0].is_unresponsive());

        let changed = roster.update_at(vec![srv("127.0.0.1", 27015)], threshold, start);
        assert!(!changed);
        assert_eq!(roster.len(), 1);
        assert!(!roster.servers()[0].is_unresponsive());
    }

    #[test]
    fn test_update_new_server() {
        let mut roster = Roster::from_servers([srv("127.0.0.1", 27015), srv("127.0.0.2", 27015)]);

        let changed = roster.update(
            vec![srv("127.0.0.1", 27015), srv("127.0.0.2", 27015), srv("127.0.0.3", 27015)],
            Some(Duration::ZERO),
        );
        assert!(changed);
        assert_eq!(roster.len(), 3);
        assert!(roster.addresses().contains(&Address::new("127.0.0.3", 27015)));
    }

    #[test]
    fn test_update_server_data() {
        let mut roster = Roster::from_servers([srv_with("127.0.0.1", 27015, 10)]);

        assert!(!roster.update(vec![srv_with("127.0.0.1", 27015, 10)], None));

        assert!(roster.update(vec![srv_with("127.0.0.1", 27015, 11)], None));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.servers()[0].info.player_count, 11);
    }

    #[test]
    fn test_update_keeps_order_on_eviction() {
        let mut roster = Roster::from_servers([
            srv("127.0.0.1", 27015),
            srv("127.0.0.2", 27015),
            srv("127.0.0.3", 27015),
        ]);
        let start = Instant::now();
        let threshold = Some(Duration::from_secs(1));
        let survivors = vec![srv("127.0.0.1", 27015), srv("127.0.0.3", 27015)];

        roster.update_at(survivors.clone(), threshold, start);
        let changed = roster.update_at(survivors, threshold, start + Duration::from_secs(2));

        assert!(changed);
        assert_eq!(
            roster.addresses(),
            vec![Address::new("127.0.0.1", 27015), Address::new("127.0.0.3", 27015)]
        );
    }
}
