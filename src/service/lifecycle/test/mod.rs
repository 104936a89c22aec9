use std::sync::Arc;

use sea_orm::{DatabaseConnection, DbErr};
use tempfile::TempDir;
use test_utils::{builder::TestBuilder, context::TestContext, factory};

use crate::{
    data::{bot::BotRepository, user::UserRepository},
    model::bot::{Bot, BotFamily},
    panel::{
        directory::PanelDirectory,
        fake::{FakeConnector, FakePanel},
    },
    service::{bot_log::BotLogStore, event::EventBus, lifecycle::BotLifecycleService},
};

mod manage;

/// Database, fake panels and collaborators for one lifecycle test.
pub(super) struct Harness {
    context: TestContext,
    pub connector: Arc<FakeConnector>,
    pub panels: PanelDirectory,
    pub events: EventBus,
    pub logs: BotLogStore,
    _log_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let context = TestBuilder::new().with_bot_tables().build().await.unwrap();
        let connector = Arc::new(FakeConnector::new());
        let log_dir = tempfile::tempdir().unwrap();

        Self {
            context,
            panels: PanelDirectory::new(connector.clone()),
            connector,
            events: EventBus::new(16),
            logs: BotLogStore::new(log_dir.path()),
            _log_dir: log_dir,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.context.db.as_ref().unwrap()
    }

    pub fn service(&self, family: BotFamily) -> BotLifecycleService<'_> {
        BotLifecycleService::new(family, self.db(), &self.panels, &self.events, &self.logs)
    }

    /// Online manager panel row with a registered fake connection.
    pub async fn manager_panel(&self) -> Result<(entity::panel::Model, Arc<FakePanel>), DbErr> {
        let panel = factory::create_panel(self.db(), "manager_bot").await?;
        let fake = Arc::new(FakePanel::new());
        self.panels.manager.register(panel.id, fake.clone());
        Ok((panel, fake))
    }

    /// Manager bot on a fresh panel, already known to the fake panel with its stored
    /// status.
    pub async fn manager_bot(
        &self,
        owner: &str,
    ) -> Result<(entity::bot::Model, Arc<FakePanel>), DbErr> {
        let (panel, fake) = self.manager_panel().await?;
        let bot = factory::bot::BotFactory::new(self.db(), owner, "manager_bot")
            .panel_id(Some(panel.id))
            .build()
            .await?;
        fake.insert(&bot.template_name, bot.connection_status.parse().unwrap());
        Ok((bot, fake))
    }

    pub async fn balance(&self, username: &str) -> i64 {
        UserRepository::new(self.db())
            .get_by_username(username)
            .await
            .unwrap()
            .unwrap()
            .balance
    }

    pub async fn bot(&self, id: i32) -> Option<Bot> {
        BotRepository::new(self.db()).get_by_id(id).await.unwrap()
    }
}
