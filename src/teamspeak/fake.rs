//! In-memory TeamSpeak instance for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::query::QueryError,
    teamspeak::{ServerInfo, ServerQuery},
};

#[derive(Default)]
pub struct FakeServerQuery {
    servers: Mutex<HashMap<i32, ServerInfo>>,
    calls: Mutex<Vec<String>>,
}

impl FakeServerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, virtual_server_id: i32, online_clients: i32, max_clients: i32) -> Self {
        self.servers.lock().insert(
            virtual_server_id,
            ServerInfo {
                online_clients,
                max_clients,
            },
        );
        self
    }

    pub fn info(&self, virtual_server_id: i32) -> Option<ServerInfo> {
        self.servers.lock().get(&virtual_server_id).copied()
    }

    /// Calls made so far, as `"method sid"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, method: &str, virtual_server_id: i32) {
        self.calls
            .lock()
            .push(format!("{} {}", method, virtual_server_id));
    }

    fn invalid_server(virtual_server_id: i32) -> QueryError {
        QueryError::Status {
            code: 1024,
            message: format!("invalid serverID {}", virtual_server_id),
        }
    }
}

#[async_trait]
impl ServerQuery for FakeServerQuery {
    async fn server_info(&self, virtual_server_id: i32) -> Result<ServerInfo, QueryError> {
        self.record("serverinfo", virtual_server_id);
        self.info(virtual_server_id)
            .ok_or_else(|| Self::invalid_server(virtual_server_id))
    }

    async fn set_max_clients(&self, virtual_server_id: i32, slots: i32) -> Result<(), QueryError> {
        self.record("serveredit", virtual_server_id);
        let mut servers = self.servers.lock();
        let server = servers
            .get_mut(&virtual_server_id)
            .ok_or_else(|| Self::invalid_server(virtual_server_id))?;
        server.max_clients = slots;
        Ok(())
    }

    async fn stop_server(&self, virtual_server_id: i32) -> Result<(), QueryError> {
        self.record("serverstop", virtual_server_id);
        self.servers
            .lock()
            .remove(&virtual_server_id)
            .map(|_| ())
            .ok_or_else(|| Self::invalid_server(virtual_server_id))
    }
}
