//! TeamSpeak server query collaborator.
//!
//! The scheduler only needs three things from a running TeamSpeak instance: the live
//! client count and slot count of a virtual server, changing the slot count, and
//! stopping a server. `ServerQuery` is that surface; `WebQueryClient` implements it
//! over the TeamSpeak WebQuery HTTP API.

pub mod cache;
pub mod webquery;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::error::query::QueryError;

/// Live state of one virtual server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    /// Connected clients, not counting query clients.
    pub online_clients: i32,
    /// Configured slot count.
    pub max_clients: i32,
}

#[async_trait]
pub trait ServerQuery: Send + Sync {
    async fn server_info(&self, virtual_server_id: i32) -> Result<ServerInfo, QueryError>;

    async fn set_max_clients(&self, virtual_server_id: i32, slots: i32) -> Result<(), QueryError>;

    async fn stop_server(&self, virtual_server_id: i32) -> Result<(), QueryError>;
}
