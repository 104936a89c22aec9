//! Shared collaborators of the background jobs.
//!
//! Built once at startup and cloned into every scheduled job. Every field is cheap to
//! clone: the connection pool, panel registries, event channel and status cache all
//! share their inner state between clones.

use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{
    panel::directory::PanelDirectory,
    service::{bot_log::BotLogStore, event::EventBus},
    teamspeak::{cache::ServerStatusCache, ServerQuery},
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,

    /// Every live panel handle, keyed by family.
    pub panels: PanelDirectory,

    /// Fan-out of bot lifecycle and status events.
    pub events: EventBus,

    pub logs: BotLogStore,

    /// Upper bound for one remote call made by a job.
    pub rpc_timeout: Duration,

    /// TeamSpeak query collaborator, `None` when WebQuery is not configured.
    pub server_query: Option<Arc<dyn ServerQuery>>,

    /// Live client counts written by the TeamSpeak job.
    pub server_status: ServerStatusCache,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        panels: PanelDirectory,
        logs: BotLogStore,
        rpc_timeout: Duration,
        server_query: Option<Arc<dyn ServerQuery>>,
    ) -> Self {
        Self {
            db,
            panels,
            events: EventBus::default(),
            logs,
            rpc_timeout,
            server_query,
            server_status: ServerStatusCache::new(),
        }
    }
}
