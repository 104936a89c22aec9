//! Panel rows and the live connections built from them.

use sea_orm::{DatabaseConnection, DbErr};
use tracing::{info, warn};
use url::Url;

use crate::{
    data::{bot::BotRepository, panel::PanelRepository},
    error::lifecycle::LifecycleError,
    model::{
        bot::BotFamily,
        panel::{CreatePanelParams, Panel, UpdatePanelParams},
    },
    panel::directory::PanelDirectory,
};

pub struct PanelService<'a> {
    db: &'a DatabaseConnection,
    panels: &'a PanelDirectory,
}

impl<'a> PanelService<'a> {
    pub fn new(db: &'a DatabaseConnection, panels: &'a PanelDirectory) -> Self {
        Self { db, panels }
    }

    /// Opens a connection for every stored panel of a socket family.
    ///
    /// A panel whose connection cannot be built is logged and skipped; the next panel
    /// sync marks it offline.
    ///
    /// # Returns
    /// - `Ok(usize)` - Number of connections registered
    /// - `Err(DbErr)` - Panels could not be read
    pub async fn bootstrap(&self) -> Result<usize, DbErr> {
        let repo = PanelRepository::new(self.db);
        let mut opened = 0;

        for family in BotFamily::ALL {
            if self.panels.registry(family).is_none() {
                continue;
            }
            for panel in repo.get_by_family(family).await? {
                match self.panels.open(&panel) {
                    Ok(true) => opened += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(family = %family, panel_id = panel.id, error = %err, "failed to open panel connection")
                    }
                }
            }
        }

        info!(opened, "panel connections registered");
        Ok(opened)
    }

    pub async fn list(&self, family: BotFamily) -> Result<Vec<Panel>, LifecycleError> {
        Ok(PanelRepository::new(self.db).get_by_family(family).await?)
    }

    /// Stores a panel and opens its connection. The panel stays `offline` until the
    /// next sync reaches it.
    pub async fn create(&self, params: CreatePanelParams) -> Result<Panel, LifecycleError> {
        if params.family.has_singleton_panel() {
            return Err(LifecycleError::BadRequest(format!(
                "The {} panel is configured through the environment",
                params.family
            )));
        }
        validate_name(&params.name)?;
        validate_host(&params.host)?;
        validate_capacity(params.max_bot_capacity)?;

        let panel = PanelRepository::new(self.db).create(params).await?;
        self.panels.open(&panel)?;

        info!(family = %panel.family, panel_id = panel.id, "panel created");
        Ok(panel)
    }

    /// Applies changes to a panel and rebuilds its connection from the stored row, so a
    /// live socket never keeps stale credentials.
    pub async fn update(
        &self,
        panel_id: i32,
        params: UpdatePanelParams,
    ) -> Result<Panel, LifecycleError> {
        if let Some(name) = &params.name {
            validate_name(name)?;
        }
        if let Some(host) = &params.host {
            validate_host(host)?;
        }
        if let Some(capacity) = params.max_bot_capacity {
            validate_capacity(capacity)?;
        }

        let panel = PanelRepository::new(self.db)
            .update(panel_id, params)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("Panel {}", panel_id)))?;

        if let Some(registry) = self.panels.registry(panel.family) {
            registry.remove(panel.id);
            self.panels.open(&panel)?;
        }

        info!(family = %panel.family, panel_id, "panel updated");
        Ok(panel)
    }

    /// Deletes a panel and disposes its connection. Its bots are marked offline and
    /// lose their panel assignment.
    pub async fn delete(&self, panel_id: i32) -> Result<(), LifecycleError> {
        let repo = PanelRepository::new(self.db);
        let panel = repo
            .get_by_id(panel_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("Panel {}", panel_id)))?;

        BotRepository::new(self.db).detach_panel(panel.id).await?;
        repo.delete(panel.id).await?;

        if let Some(registry) = self.panels.registry(panel.family) {
            registry.remove(panel.id);
        }

        info!(family = %panel.family, panel_id, "panel deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), LifecycleError> {
    if name.trim().is_empty() {
        return Err(LifecycleError::BadRequest(
            "Panel name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_host(host: &str) -> Result<(), LifecycleError> {
    let valid = Url::parse(host)
        .map(|url| matches!(url.scheme(), "http" | "https" | "ws" | "wss") && url.has_host())
        .unwrap_or(false);
    if !valid {
        return Err(LifecycleError::BadRequest(format!(
            "Invalid panel host '{}'",
            host
        )));
    }
    Ok(())
}

fn validate_capacity(capacity: i32) -> Result<(), LifecycleError> {
    if capacity < 0 {
        return Err(LifecycleError::BadRequest(format!(
            "Invalid bot capacity {}",
            capacity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_utils::{builder::TestBuilder, factory};

    use super::*;
    use crate::{model::bot::ConnectionStatus, panel::fake::FakeConnector};

    fn params(family: BotFamily, host: &str) -> CreatePanelParams {
        CreatePanelParams {
            family,
            name: "Frankfurt".to_string(),
            host: host.to_string(),
            token: "secret".to_string(),
            max_bot_capacity: 50,
        }
    }

    /// Tests startup registration.
    ///
    /// Expected: manager panels registered, audio panels skipped
    #[tokio::test]
    async fn bootstrap_registers_socket_panels_only() -> Result<(), DbErr> {
        let mut test = TestBuilder::new().with_bot_tables().build().await.unwrap();
        let db = test.database().await.unwrap();
        let manager = factory::create_panel(db, "manager_bot").await?;
        factory::create_panel(db, "audio_bot").await?;
        let connector = Arc::new(FakeConnector::new());
        let panels = PanelDirectory::new(connector.clone());

        let opened = PanelService::new(db, &panels).bootstrap().await?;

        assert_eq!(opened, 1);
        assert_eq!(panels.manager.ids(), vec![manager.id]);
        assert_eq!(connector.sockets().len(), 1);

        Ok(())
    }

    /// Tests creating panels.
    ///
    /// Expected: stored offline with a registered connection; invalid input and rank
    /// panels rejected before anything is stored
    #[tokio::test]
    async fn create_validates_and_registers() -> Result<(), DbErr> {
        let mut test = TestBuilder::new().with_bot_tables().build().await.unwrap();
        let db = test.database().await.unwrap();
        let panels = PanelDirectory::new(Arc::new(FakeConnector::new()));
        let service = PanelService::new(db, &panels);

        let panel = service
            .create(params(BotFamily::ManagerBot, "wss://panel.example.com"))
            .await
            .unwrap();
        let bad_host = service
            .create(params(BotFamily::ManagerBot, "panel.example.com"))
            .await
            .unwrap_err();
        let rank = service
            .create(params(BotFamily::RankSystem, "wss://rank.example.com"))
            .await
            .unwrap_err();

        assert!(!panel.is_online());
        assert!(panels.manager.get(panel.id).is_some());
        assert_eq!(bad_host.code(), "BAD_REQUEST");
        assert_eq!(rank.code(), "BAD_REQUEST");
        assert_eq!(service.list(BotFamily::ManagerBot).await.unwrap().len(), 1);

        Ok(())
    }

    /// Tests editing a panel.
    ///
    /// Expected: old connection disposed, new one built from the new host
    #[tokio::test]
    async fn update_rebuilds_connection() -> Result<(), DbErr> {
        let mut test = TestBuilder::new().with_bot_tables().build().await.unwrap();
        let db = test.database().await.unwrap();
        let connector = Arc::new(FakeConnector::new());
        let panels = PanelDirectory::new(connector.clone());
        let service = PanelService::new(db, &panels);
        let panel = service
            .create(params(BotFamily::ManagerBot, "wss://old.example.com"))
            .await
            .unwrap();

        let updated = service
            .update(
                panel.id,
                UpdatePanelParams {
                    host: Some("wss://new.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sockets = connector.sockets();
        assert_eq!(updated.host, "wss://new.example.com");
        assert_eq!(sockets.len(), 2);
        assert!(sockets[0].1.is_disposed());
        assert_eq!(sockets[1].0, "wss://new.example.com");
        assert!(!sockets[1].1.is_disposed());
        assert!(matches!(
            service.update(panel.id + 100, Default::default()).await,
            Err(LifecycleError::NotFound(_))
        ));

        Ok(())
    }

    /// Tests deleting a panel with bots on it.
    ///
    /// Expected: connection disposed, bots kept offline without a panel
    #[tokio::test]
    async fn delete_disposes_connection_and_detaches_bots() -> Result<(), DbErr> {
        let mut test = TestBuilder::new().with_bot_tables().build().await.unwrap();
        let db = test.database().await.unwrap();
        let connector = Arc::new(FakeConnector::new());
        let panels = PanelDirectory::new(connector.clone());
        let service = PanelService::new(db, &panels);
        let user = factory::create_user(db).await?;
        let panel = service
            .create(params(BotFamily::ManagerBot, "wss://panel.example.com"))
            .await
            .unwrap();
        let bot = factory::bot::BotFactory::new(db, &user.username, "manager_bot")
            .panel_id(Some(panel.id))
            .connection_status("online")
            .build()
            .await?;

        service.delete(panel.id).await.unwrap();

        let stored = BotRepository::new(db).get_by_id(bot.id).await?.unwrap();
        assert_eq!(stored.connection_status, ConnectionStatus::Offline);
        assert_eq!(stored.panel_id, None);
        assert!(panels.manager.is_empty());
        assert!(connector.sockets()[0].1.is_disposed());

        Ok(())
    }
}
