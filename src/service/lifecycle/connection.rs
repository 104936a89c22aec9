use tracing::{debug, warn};

use crate::{
    error::{lifecycle::LifecycleError, panel::PanelErrorCode},
    model::{
        bot::{Bot, ConnectionStatus},
        user::Requester,
    },
    panel::PanelApi,
};

use super::BotLifecycleService;

impl BotLifecycleService<'_> {
    /// Connects a bot to its voice server.
    ///
    /// Connecting an already connected bot succeeds. A bot its panel has lost is
    /// recreated from the stored template and connected once more.
    ///
    /// # Returns
    /// - `Ok(Bot)` - The bot, now `online`
    /// - `Err(LifecycleError::NotFound)` - Unknown or suspended bot
    /// - `Err(LifecycleError::PanelOffline)` / `Err(LifecycleError::PanelUnreachable)` -
    ///   Panel cannot serve the call
    pub async fn connect(&self, requester: &Requester, bot_id: i32) -> Result<Bot, LifecycleError> {
        let bot = self.load_actionable(requester, bot_id).await?;
        let remote = self.remote_for(&bot).await?;

        self.connect_remote(remote.as_ref(), &bot).await?;

        self.write_status(&bot, ConnectionStatus::Online, Some(&requester.username))
            .await
    }

    /// Disconnects a bot. Disconnecting a bot that is not connected succeeds.
    pub async fn disconnect(
        &self,
        requester: &Requester,
        bot_id: i32,
    ) -> Result<Bot, LifecycleError> {
        let bot = self.load_actionable(requester, bot_id).await?;
        let remote = self.remote_for(&bot).await?;

        match remote.disconnect_bot(&bot.template_name).await {
            Ok(()) => {}
            Err(err) if is_disconnected(&err.code) => {
                debug!(family = %self.family, bot_id, code = %err.code, "bot already disconnected");
            }
            Err(err) => return Err(err.into()),
        }

        self.write_status(&bot, ConnectionStatus::Offline, Some(&requester.username))
            .await
    }

    /// Reconnects a bot, recreating it first when its panel has lost it.
    pub async fn reconnect(
        &self,
        requester: &Requester,
        bot_id: i32,
    ) -> Result<Bot, LifecycleError> {
        let bot = self.load_actionable(requester, bot_id).await?;
        let remote = self.remote_for(&bot).await?;

        match remote.reconnect_bot(&bot.template_name).await {
            Ok(()) => {}
            Err(err) if err.code == PanelErrorCode::NotFound => {
                self.heal(remote.as_ref(), &bot).await?;
            }
            Err(err) => return Err(err.into()),
        }

        self.write_status(&bot, ConnectionStatus::Online, Some(&requester.username))
            .await
    }

    /// Reads the bot's status from its panel and stores it.
    ///
    /// Suspended bots are returned unchanged without asking the panel. A bot the panel
    /// does not know is stored as `offline`.
    pub async fn refresh(&self, requester: &Requester, bot_id: i32) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;
        if bot.is_suspended() {
            return Ok(bot);
        }

        let remote = self.remote_for(&bot).await?;
        let status = match remote.bot_info(&bot.template_name).await {
            Ok(info) => info.status,
            Err(err) if err.code == PanelErrorCode::NotFound => ConnectionStatus::Offline,
            Err(err) => return Err(err.into()),
        };

        if status == bot.connection_status {
            return Ok(bot);
        }
        self.write_status(&bot, status, Some(&requester.username))
            .await
    }

    /// Connects `bot` on `remote`, treating an already connected bot as success and
    /// healing a bot the panel has lost.
    pub(super) async fn connect_remote(
        &self,
        remote: &dyn PanelApi,
        bot: &Bot,
    ) -> Result<(), LifecycleError> {
        match remote.connect_bot(&bot.template_name).await {
            Ok(()) => Ok(()),
            Err(err) if err.code == PanelErrorCode::AlreadyConnected => {
                debug!(family = %self.family, bot_id = bot.id, "bot already connected");
                Ok(())
            }
            Err(err) if err.code == PanelErrorCode::NotFound => self.heal(remote, bot).await,
            Err(err) => Err(err.into()),
        }
    }

    /// Recreates a lost bot from its stored template and connects it once.
    async fn heal(&self, remote: &dyn PanelApi, bot: &Bot) -> Result<(), LifecycleError> {
        warn!(
            family = %self.family,
            bot_id = bot.id,
            template_name = %bot.template_name,
            "panel lost bot, recreating from stored template"
        );
        self.recreate(remote, bot).await?;

        match remote.connect_bot(&bot.template_name).await {
            Ok(()) => Ok(()),
            Err(err) if err.code == PanelErrorCode::AlreadyConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Creates `bot` on `remote`; a bot that already exists there counts as created.
    pub(super) async fn recreate(
        &self,
        remote: &dyn PanelApi,
        bot: &Bot,
    ) -> Result<(), LifecycleError> {
        match remote.create_bot(&bot.remote_template()).await {
            Ok(()) => Ok(()),
            Err(err) if err.code == PanelErrorCode::AlreadyAdded => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Remote codes meaning the bot is already not connected.
pub(super) fn is_disconnected(code: &PanelErrorCode) -> bool {
    matches!(code, PanelErrorCode::NotConnected | PanelErrorCode::NotFound)
}
