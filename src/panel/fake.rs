//! In-memory panels for tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::panel::{PanelError, PanelErrorCode},
    model::{
        bot::{BotFamily, BotTemplate, ConnectionStatus, RemoteBot},
        panel::Panel,
    },
    panel::{directory::PanelConnector, PanelApi, PanelResult},
};

#[derive(Default)]
struct FakeState {
    bots: HashMap<String, ConnectionStatus>,
    /// Insertion order of template names, so listings are deterministic.
    order: Vec<String>,
    calls: Vec<String>,
    failures: HashMap<&'static str, PanelError>,
    unreachable: bool,
    disposed: bool,
}

/// Panel that keeps its bots in memory and follows the remote error semantics
/// (`NOT_FOUND`, `ALREADY_CONNECTED`, `NOT_CONNECTED`, `ALREADY_ADDED`).
#[derive(Default)]
pub struct FakePanel {
    state: Mutex<FakeState>,
}

impl FakePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot(self, template_name: &str, status: ConnectionStatus) -> Self {
        self.insert(template_name, status);
        self
    }

    pub fn insert(&self, template_name: &str, status: ConnectionStatus) {
        let mut state = self.state.lock();
        if state.bots.insert(template_name.to_string(), status).is_none() {
            state.order.push(template_name.to_string());
        }
    }

    pub fn forget(&self, template_name: &str) {
        let mut state = self.state.lock();
        state.bots.remove(template_name);
        state.order.retain(|name| name != template_name);
    }

    /// Makes every later call of `method` fail with `err`.
    pub fn fail(&self, method: &'static str, err: PanelError) {
        self.state.lock().failures.insert(method, err);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn status_of(&self, template_name: &str) -> Option<ConnectionStatus> {
        self.state.lock().bots.get(template_name).copied()
    }

    pub fn has_bot(&self, template_name: &str) -> bool {
        self.state.lock().bots.contains_key(template_name)
    }

    /// Calls made so far, as `"method template_name"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(method))
            .count()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    fn enter(&self, method: &'static str, template_name: &str) -> PanelResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("{} {}", method, template_name));
        if state.unreachable {
            return Err(PanelError::unreachable("fake panel unreachable"));
        }
        match state.failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn not_found(template_name: &str) -> PanelError {
        PanelError::new(PanelErrorCode::NotFound, template_name)
    }
}

#[async_trait]
impl PanelApi for FakePanel {
    async fn create_bot(&self, template: &BotTemplate) -> PanelResult<()> {
        self.enter("createBot", &template.template_name)?;
        if self.has_bot(&template.template_name) {
            return Err(PanelError::new(
                PanelErrorCode::AlreadyAdded,
                template.template_name.clone(),
            ));
        }
        self.insert(&template.template_name, ConnectionStatus::Offline);
        Ok(())
    }

    async fn delete_bot(&self, template_name: &str) -> PanelResult<()> {
        self.enter("deleteBot", template_name)?;
        if !self.has_bot(template_name) {
            return Err(Self::not_found(template_name));
        }
        self.forget(template_name);
        Ok(())
    }

    async fn connect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.enter("connectBot", template_name)?;
        match self.status_of(template_name) {
            None => Err(Self::not_found(template_name)),
            Some(ConnectionStatus::Online) => Err(PanelError::new(
                PanelErrorCode::AlreadyConnected,
                template_name,
            )),
            Some(_) => {
                self.insert(template_name, ConnectionStatus::Online);
                Ok(())
            }
        }
    }

    async fn disconnect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.enter("disconnectBot", template_name)?;
        match self.status_of(template_name) {
            None => Err(Self::not_found(template_name)),
            Some(ConnectionStatus::Offline) => Err(PanelError::new(
                PanelErrorCode::NotConnected,
                template_name,
            )),
            Some(_) => {
                self.insert(template_name, ConnectionStatus::Offline);
                Ok(())
            }
        }
    }

    async fn reconnect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.enter("reconnectBot", template_name)?;
        if !self.has_bot(template_name) {
            return Err(Self::not_found(template_name));
        }
        self.insert(template_name, ConnectionStatus::Online);
        Ok(())
    }

    async fn bot_info(&self, template_name: &str) -> PanelResult<RemoteBot> {
        self.enter("getBotInfo", template_name)?;
        self.status_of(template_name)
            .map(|status| RemoteBot {
                template_name: template_name.to_string(),
                status,
            })
            .ok_or_else(|| Self::not_found(template_name))
    }

    async fn bot_list(&self) -> PanelResult<Vec<RemoteBot>> {
        self.enter("getBotList", "")?;
        let state = self.state.lock();
        Ok(state
            .order
            .iter()
            .filter_map(|name| {
                state.bots.get(name).map(|status| RemoteBot {
                    template_name: name.clone(),
                    status: *status,
                })
            })
            .collect())
    }

    fn dispose(&self) {
        self.state.lock().disposed = true;
    }
}

/// Connector handing out `FakePanel`s.
///
/// Audio panels are looked up by panel id (`audio_panel`); socket connections are
/// created fresh and recorded by host so tests can reach them.
#[derive(Default)]
pub struct FakeConnector {
    audio: Mutex<HashMap<i32, Arc<FakePanel>>>,
    sockets: Mutex<Vec<(String, Arc<FakePanel>)>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fake behind audio panel `panel_id`, created on first use.
    pub fn audio_panel(&self, panel_id: i32) -> Arc<FakePanel> {
        self.audio
            .lock()
            .entry(panel_id)
            .or_insert_with(|| Arc::new(FakePanel::new()))
            .clone()
    }

    /// Every socket connection opened so far, with the host it was opened for.
    pub fn sockets(&self) -> Vec<(String, Arc<FakePanel>)> {
        self.sockets.lock().clone()
    }
}

impl PanelConnector for FakeConnector {
    fn audio(&self, panel: &Panel) -> PanelResult<Arc<dyn PanelApi>> {
        Ok(self.audio_panel(panel.id))
    }

    fn socket(
        &self,
        _family: BotFamily,
        _panel_id: Option<i32>,
        host: &str,
        _token: &str,
    ) -> PanelResult<Arc<dyn PanelApi>> {
        let panel = Arc::new(FakePanel::new());
        self.sockets.lock().push((host.to_string(), panel.clone()));
        Ok(panel)
    }
}
