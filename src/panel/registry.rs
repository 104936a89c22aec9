//! Live socket panel connections.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::info;

use crate::{
    error::panel::{PanelError, PanelErrorCode},
    panel::{PanelApi, PanelResult},
};

/// Map from panel row id to its live connection.
///
/// Cloning shares the same map. Created at startup, passed to whatever needs it and
/// cleared at shutdown.
#[derive(Clone, Default)]
pub struct PanelRegistry {
    panels: Arc<RwLock<HashMap<i32, Arc<dyn PanelApi>>>>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection` for `panel_id`, disposing any connection it replaces.
    pub fn register(&self, panel_id: i32, connection: Arc<dyn PanelApi>) {
        let previous = self.panels.write().insert(panel_id, connection);
        if let Some(previous) = previous {
            previous.dispose();
        }
        info!(panel_id, "panel connection registered");
    }

    pub fn get(&self, panel_id: i32) -> Option<Arc<dyn PanelApi>> {
        self.panels.read().get(&panel_id).cloned()
    }

    /// Disposes and unregisters the connection of `panel_id`.
    ///
    /// # Returns
    /// - `true` - A connection existed and was removed
    /// - `false` - Nothing was registered for this id
    pub fn remove(&self, panel_id: i32) -> bool {
        let removed = self.panels.write().remove(&panel_id);
        match removed {
            Some(connection) => {
                connection.dispose();
                info!(panel_id, "panel connection removed");
                true
            }
            None => false,
        }
    }

    /// Registered panel ids, ascending.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.panels.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.panels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.read().is_empty()
    }

    /// Disposes every connection.
    pub fn clear(&self) {
        let drained: Vec<_> = self.panels.write().drain().collect();
        for (_, connection) in drained {
            connection.dispose();
        }
    }
}

/// The single process-wide rank-system panel.
///
/// Unlike other families there is exactly one rank panel, configured from the
/// environment rather than panel rows, so there is no key to look it up by.
#[derive(Clone, Default)]
pub struct RankPanel {
    inner: Arc<RwLock<Option<Arc<dyn PanelApi>>>>,
}

impl RankPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the rank panel connection, disposing a previous one.
    pub fn init(&self, connection: Arc<dyn PanelApi>) {
        let previous = self.inner.write().replace(connection);
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// The rank panel connection.
    ///
    /// # Returns
    /// - `Ok(connection)` - Panel is initialized
    /// - `Err(PanelError)` - `PANEL_NOT_INITIALIZED`; no rank panel is configured
    pub fn get(&self) -> PanelResult<Arc<dyn PanelApi>> {
        self.inner.read().clone().ok_or_else(|| {
            PanelError::new(
                PanelErrorCode::NotInitialized,
                "rank system panel is not initialized",
            )
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Disposes and clears the rank panel connection.
    pub fn shutdown(&self) {
        let previous = self.inner.write().take();
        if let Some(previous) = previous {
            previous.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::fake::FakePanel;

    #[test]
    fn remove_disposes_and_reports_presence() {
        let registry = PanelRegistry::new();
        let panel = Arc::new(FakePanel::new());
        registry.register(3, panel.clone());

        assert!(registry.get(3).is_some());
        assert!(registry.remove(3));
        assert!(!registry.remove(3));
        assert!(registry.get(3).is_none());
        assert!(panel.is_disposed());
    }

    #[test]
    fn register_replaces_and_disposes_previous() {
        let registry = PanelRegistry::new();
        let old = Arc::new(FakePanel::new());
        let new = Arc::new(FakePanel::new());

        registry.register(1, old.clone());
        registry.register(1, new.clone());

        assert!(old.is_disposed());
        assert!(!new.is_disposed());
        assert_eq!(registry.ids(), vec![1]);
    }

    #[test]
    fn rank_panel_errors_before_init() {
        let rank = RankPanel::new();

        let err = rank.get().err().unwrap();
        assert_eq!(err.code, PanelErrorCode::NotInitialized);

        let panel = Arc::new(FakePanel::new());
        rank.init(panel.clone());
        assert!(rank.get().is_ok());

        rank.shutdown();
        assert!(panel.is_disposed());
        assert!(!rank.is_initialized());
    }
}
