//! Registry of every client id the server has seen

use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::Mutex;

use crate::protocol::ClientId;

/// Maps a client id to the host it last connected from.
///
/// Entries are never removed, so the size is the number of distinct ids ever
/// seen rather than the number of open connections.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, IpAddr>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `host` as the last address for `id` and return the registry size
    pub async fn upsert(&self, id: ClientId, host: IpAddr) -> usize {
        let mut clients = self.clients.lock().await;
        clients.insert(id, host);
        clients.len()
    }

    /// Number of distinct client ids seen
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Last host recorded for `id`
    #[cfg(test)]
    pub async fn get(&self, id: &ClientId) -> Option<IpAddr> {
        self.clients.lock().await.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn id(s: &str) -> ClientId {
        ClientId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_counts_distinct_ids() {
        let registry = ClientRegistry::new();
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);

        assert!(registry.is_empty().await);
        assert_eq!(registry.upsert(id("1"), host).await, 1);
        assert_eq!(registry.upsert(id("2"), host).await, 2);
        assert_eq!(registry.upsert(id("1"), host).await, 2);
    }

    #[tokio::test]
    async fn test_upsert_keeps_latest_address() {
        let registry = ClientRegistry::new();
        let first = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let second = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        registry.upsert(id("1234"), first).await;
        let size = registry.upsert(id("1234"), second).await;

        assert_eq!(size, 1);
        assert_eq!(registry.get(&id("1234")).await, Some(second));
    }
}
