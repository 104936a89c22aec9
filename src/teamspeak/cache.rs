//! In-memory live status of TeamSpeak servers.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStatus {
    pub online: bool,
    /// Last known client count; zero while offline.
    pub online_clients: i32,
    pub updated_at: DateTime<Utc>,
}

/// Latest observed status per server id. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct ServerStatusCache {
    inner: Arc<RwLock<HashMap<i32, ServerStatus>>>,
}

impl ServerStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, server_id: i32, online_clients: i32) {
        self.inner.write().insert(
            server_id,
            ServerStatus {
                online: true,
                online_clients,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn set_offline(&self, server_id: i32) {
        self.inner.write().insert(
            server_id,
            ServerStatus {
                online: false,
                online_clients: 0,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, server_id: i32) -> Option<ServerStatus> {
        self.inner.read().get(&server_id).copied()
    }

    pub fn remove(&self, server_id: i32) -> bool {
        self.inner.write().remove(&server_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_resets_client_count() {
        let cache = ServerStatusCache::new();

        cache.set_online(1, 12);
        assert_eq!(cache.get(1).unwrap().online_clients, 12);

        cache.set_offline(1);
        let status = cache.get(1).unwrap();
        assert!(!status.online);
        assert_eq!(status.online_clients, 0);
        assert!(cache.remove(1));
        assert_eq!(cache.get(1), None);
    }
}
