//! Bot lifecycle for one bot family.
//!
//! `BotLifecycleService` is the only place bot business rules are enforced. Every
//! operation takes the acting `Requester` and returns `LifecycleError` on failure; the
//! route layer maps `LifecycleError::code()` to its own responses.
//!
//! Operations run in the order authorize, validate, debit or credit, remote call,
//! persist. Writes that touch a balance run inside one database transaction that never
//! shares the pool with other queries while open.

mod connection;
mod create;
mod manage;

#[cfg(test)]
mod test;

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{error, info};

use crate::{
    data::{bot::BotRepository, panel::PanelRepository},
    error::lifecycle::LifecycleError,
    model::{
        bot::{Bot, BotFamily, ConnectionStatus},
        panel::Panel,
        user::Requester,
    },
    panel::{directory::PanelDirectory, PanelApi},
    service::{
        bot_log::BotLogStore,
        event::{BotEvent, BotEventKind, EventBus},
    },
};

pub struct BotLifecycleService<'a> {
    family: BotFamily,
    db: &'a DatabaseConnection,
    panels: &'a PanelDirectory,
    events: &'a EventBus,
    logs: &'a BotLogStore,
}

impl<'a> BotLifecycleService<'a> {
    pub fn new(
        family: BotFamily,
        db: &'a DatabaseConnection,
        panels: &'a PanelDirectory,
        events: &'a EventBus,
        logs: &'a BotLogStore,
    ) -> Self {
        Self {
            family,
            db,
            panels,
            events,
            logs,
        }
    }

    pub fn family(&self) -> BotFamily {
        self.family
    }

    /// Bots of this family the requester may see: all of them for admins, their own for
    /// resellers. Suspended bots are included.
    pub async fn list(&self, requester: &Requester) -> Result<Vec<Bot>, LifecycleError> {
        let owner = (!requester.is_admin()).then_some(requester.username.as_str());

        Ok(BotRepository::new(self.db)
            .get_by_family(self.family, owner)
            .await?)
    }

    pub async fn get(&self, requester: &Requester, bot_id: i32) -> Result<Bot, LifecycleError> {
        self.load_authorized(requester, bot_id).await
    }

    /// Loads a bot of this family and checks the requester may act on it.
    ///
    /// # Returns
    /// - `Ok(Bot)` - The bot
    /// - `Err(LifecycleError::NotFound)` - No bot with this id in this family
    /// - `Err(LifecycleError::Forbidden)` - Reseller acting on someone else's bot
    async fn load_authorized(
        &self,
        requester: &Requester,
        bot_id: i32,
    ) -> Result<Bot, LifecycleError> {
        let bot = BotRepository::new(self.db)
            .get_by_id(bot_id)
            .await?
            .filter(|bot| bot.family == self.family)
            .ok_or_else(|| self.not_found(bot_id))?;

        if !requester.can_manage(&bot.owner_username) {
            return Err(LifecycleError::Forbidden);
        }

        Ok(bot)
    }

    /// Like `load_authorized`, but suspended bots are reported as not found.
    async fn load_actionable(
        &self,
        requester: &Requester,
        bot_id: i32,
    ) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;
        if bot.is_suspended() {
            return Err(self.not_found(bot_id));
        }
        Ok(bot)
    }

    fn not_found(&self, bot_id: i32) -> LifecycleError {
        LifecycleError::NotFound(format!("{} {}", self.family, bot_id))
    }

    /// Panel handle serving an existing bot.
    ///
    /// # Returns
    /// - `Ok(api)` - Handle ready for calls
    /// - `Err(LifecycleError::PanelOffline)` - Panel missing, marked offline, without a
    ///   registered connection, or the rank panel is not initialized
    async fn remote_for(&self, bot: &Bot) -> Result<Arc<dyn PanelApi>, LifecycleError> {
        if self.family.has_singleton_panel() {
            return self.rank_remote();
        }

        let panel_id = bot
            .panel_id
            .ok_or_else(|| LifecycleError::PanelOffline("(unassigned)".to_string()))?;
        let panel = PanelRepository::new(self.db)
            .get_by_id(panel_id)
            .await?
            .ok_or_else(|| LifecycleError::PanelOffline(format!("#{}", panel_id)))?;

        self.remote_for_panel(&panel)
    }

    fn remote_for_panel(&self, panel: &Panel) -> Result<Arc<dyn PanelApi>, LifecycleError> {
        if !panel.is_online() {
            return Err(LifecycleError::PanelOffline(panel.name.clone()));
        }

        self.panels
            .for_panel(panel)?
            .ok_or_else(|| LifecycleError::PanelOffline(panel.name.clone()))
    }

    fn rank_remote(&self) -> Result<Arc<dyn PanelApi>, LifecycleError> {
        self.panels
            .rank
            .get()
            .map_err(|_| LifecycleError::PanelOffline("rank system".to_string()))
    }

    /// Persists a new connection status and announces it.
    async fn write_status(
        &self,
        bot: &Bot,
        status: ConnectionStatus,
        actor: Option<&str>,
    ) -> Result<Bot, LifecycleError> {
        BotRepository::new(self.db)
            .set_connection_status(bot.id, status)
            .await?;

        info!(
            family = %self.family,
            bot_id = bot.id,
            status = status.as_str(),
            "bot connection status changed"
        );
        self.publish(actor, bot.id, BotEventKind::StatusChanged { status });

        Ok(Bot {
            connection_status: status,
            ..bot.clone()
        })
    }

    fn publish(&self, actor: Option<&str>, bot_id: i32, kind: BotEventKind) {
        self.events.publish(BotEvent {
            actor: actor.map(str::to_string),
            family: self.family,
            bot_id: Some(bot_id),
            kind,
        });
    }

    /// Reports a step of an operation whose bot row is not committed yet.
    fn progress(&self, actor: &str, message: &str) {
        self.events.publish(BotEvent {
            actor: Some(actor.to_string()),
            family: self.family,
            bot_id: None,
            kind: BotEventKind::Progress {
                message: message.to_string(),
            },
        });
    }

    async fn begin(&self) -> Result<DatabaseTransaction, LifecycleError> {
        Ok(self.db.begin().await?)
    }

    async fn rollback(&self, txn: DatabaseTransaction, bot_id: Option<i32>) {
        if let Err(err) = txn.rollback().await {
            error!(family = %self.family, bot_id, error = %err, "transaction rollback failed");
        }
    }
}
