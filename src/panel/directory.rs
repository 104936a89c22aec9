//! Resolution of a bot family's panels to callable `PanelApi`s.

use std::{sync::Arc, time::Duration};

use crate::{
    model::{bot::BotFamily, panel::Panel},
    panel::{
        audio::AudioPanelClient,
        connection::{PanelConnection, SocketSettings},
        registry::{PanelRegistry, RankPanel},
        PanelApi, PanelResult,
    },
    service::bot_log::BotLogStore,
};

/// Builds transport clients for panels.
///
/// The seam between panel bookkeeping and real network transports.
pub trait PanelConnector: Send + Sync {
    /// Stateless client for an audio panel, built per operation.
    fn audio(&self, panel: &Panel) -> PanelResult<Arc<dyn PanelApi>>;

    /// Starts a persistent socket connection.
    fn socket(
        &self,
        family: BotFamily,
        panel_id: Option<i32>,
        host: &str,
        token: &str,
    ) -> PanelResult<Arc<dyn PanelApi>>;
}

/// Production connector: reqwest for audio panels, websockets for the rest.
pub struct LivePanelConnector {
    http: reqwest::Client,
    socket: SocketSettings,
    logs: BotLogStore,
}

impl LivePanelConnector {
    pub fn new(http: reqwest::Client, socket: SocketSettings, logs: BotLogStore) -> Self {
        Self { http, socket, logs }
    }

    fn audio_timeout(&self) -> Duration {
        self.socket.rpc_timeout
    }
}

impl PanelConnector for LivePanelConnector {
    fn audio(&self, panel: &Panel) -> PanelResult<Arc<dyn PanelApi>> {
        let client =
            AudioPanelClient::new(self.http.clone(), &panel.host, &panel.token, self.audio_timeout())?;
        Ok(Arc::new(client))
    }

    fn socket(
        &self,
        family: BotFamily,
        panel_id: Option<i32>,
        host: &str,
        token: &str,
    ) -> PanelResult<Arc<dyn PanelApi>> {
        let connection =
            PanelConnection::spawn(family, panel_id, host, token, self.socket, self.logs.clone())?;
        Ok(Arc::new(connection))
    }
}

/// Every panel handle the process holds.
///
/// Cloning shares the same registries.
#[derive(Clone)]
pub struct PanelDirectory {
    /// Manager-bot panel connections by panel id.
    pub manager: PanelRegistry,
    pub rank: RankPanel,
    connector: Arc<dyn PanelConnector>,
}

impl PanelDirectory {
    pub fn new(connector: Arc<dyn PanelConnector>) -> Self {
        Self {
            manager: PanelRegistry::new(),
            rank: RankPanel::new(),
            connector,
        }
    }

    pub fn connector(&self) -> &Arc<dyn PanelConnector> {
        &self.connector
    }

    /// Registry holding the connections of a keyed socket family, `None` for audio
    /// (stateless) and rank (singleton).
    pub fn registry(&self, family: BotFamily) -> Option<&PanelRegistry> {
        match family {
            BotFamily::ManagerBot => Some(&self.manager),
            BotFamily::AudioBot | BotFamily::RankSystem => None,
        }
    }

    /// Callable handle for `panel`.
    ///
    /// # Returns
    /// - `Ok(Some(api))` - Handle ready for calls
    /// - `Ok(None)` - Socket family panel with no registered connection
    /// - `Err(PanelError)` - Audio client could not be built from the panel row
    pub fn for_panel(&self, panel: &Panel) -> PanelResult<Option<Arc<dyn PanelApi>>> {
        match panel.family {
            BotFamily::AudioBot => self.connector.audio(panel).map(Some),
            BotFamily::ManagerBot => Ok(self.manager.get(panel.id)),
            BotFamily::RankSystem => Ok(self.rank.get().ok()),
        }
    }

    /// Opens and registers a socket connection for a panel row. Audio panels have
    /// nothing to register and are ignored.
    ///
    /// # Returns
    /// - `Ok(true)` - Connection registered
    /// - `Ok(false)` - Family without keyed connections
    /// - `Err(PanelError)` - Invalid host
    pub fn open(&self, panel: &Panel) -> PanelResult<bool> {
        let Some(registry) = self.registry(panel.family) else {
            return Ok(false);
        };

        let connection =
            self.connector
                .socket(panel.family, Some(panel.id), &panel.host, &panel.token)?;
        registry.register(panel.id, connection);
        Ok(true)
    }

    /// Starts the rank-system singleton connection.
    pub fn init_rank(&self, host: &str, token: &str) -> PanelResult<()> {
        let connection = self
            .connector
            .socket(BotFamily::RankSystem, None, host, token)?;
        self.rank.init(connection);
        Ok(())
    }

    /// Disposes every connection.
    pub fn shutdown(&self) {
        self.manager.clear();
        self.rank.shutdown();
    }
}
