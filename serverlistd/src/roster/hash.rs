use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::{RosterSnapshot, ServerView};

/// Hash only what a listing shows. `updated_at` moves on every publish.
#[derive(Serialize)]
struct HashView<'a> {
    servers: Vec<&'a ServerView>,
    offline: usize,
}

/// Computes a SHA-256 hash of a roster snapshot.
/// Servers are sorted by address so roster order does not matter.
pub fn compute_hash(snapshot: &RosterSnapshot) -> String {
    let mut servers: Vec<&ServerView> = snapshot.servers.iter().collect();
    servers.sort_by(|a, b| a.address.cmp(&b.address));

    let view = HashView {
        servers,
        offline: snapshot.offline,
    };

    // Plain strings and integers, serialization cannot fail.
    let json = serde_json::to_string(&view).unwrap_or_default();

    let hash = Sha256::digest(json.as_bytes());
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn view(address: &str, players: u32) -> ServerView {
        ServerView {
            address: address.to_string(),
            name: "name".to_string(),
            map: "map".to_string(),
            players,
            max_players: 12,
            unresponsive: false,
        }
    }

    fn snapshot(servers: Vec<ServerView>) -> RosterSnapshot {
        RosterSnapshot {
            servers,
            offline: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_hash_deterministic() {
        let a = view("127.0.0.1:27015", 1);
        let b = view("127.0.0.2:27015", 2);

        let hash1 = compute_hash(&snapshot(vec![a.clone(), b.clone()]));
        let hash2 = compute_hash(&snapshot(vec![b, a]));

        assert_eq!(hash1, hash2, "Hash should be same regardless of roster order");
    }

    #[test]
    fn test_hash_changes_on_modification() {
        let hash1 = compute_hash(&snapshot(vec![view("127.0.0.1:27015", 1)]));
        let hash2 = compute_hash(&snapshot(vec![view("127.0.0.1:27015", 2)]));
        assert_ne!(hash1, hash2);

        let mut offline = snapshot(vec![view("127.0.0.1:27015", 1)]);
        offline.offline = 1;
        assert_ne!(hash1, compute_hash(&offline));
    }

    #[test]
    fn test_hash_stable_across_timestamp_changes() {
        let first = snapshot(vec![view("127.0.0.1:27015", 1)]);
        let mut second = first.clone();
        second.updated_at = Utc::now() + chrono::Duration::seconds(60);

        assert_eq!(compute_hash(&first), compute_hash(&second));
    }
}
