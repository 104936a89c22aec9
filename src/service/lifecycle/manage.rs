use chrono::Utc;
use sea_orm::DatabaseTransaction;
use tracing::{debug, info, warn};

use crate::{
    data::{bot::BotRepository, panel::PanelRepository},
    error::{lifecycle::LifecycleError, panel::PanelErrorCode},
    model::{
        billing::BillingSnapshot,
        bot::{Bot, ConnectionStatus, EditBotParams, LifecycleState},
        user::Requester,
    },
    service::{
        billing::{chargeable_days, permission_change_charge, refund_amount, BillingLedger},
        event::BotEventKind,
    },
};

use super::{connection::is_disconnected, BotLifecycleService};

impl BotLifecycleService<'_> {
    /// Changes a bot's template and, for manager bots, its permissions.
    ///
    /// Added permissions are charged for the days left on the bot (one month for
    /// unlimited bots). Active bots are replaced on their panel, since panels have no
    /// partial update, and reconnected if they were connected. Suspended bots only get
    /// the stored change.
    ///
    /// The debit is committed before the panel is touched; a failing redeploy leaves the
    /// bot `offline` with the new configuration stored.
    pub async fn edit(
        &self,
        requester: &Requester,
        bot_id: i32,
        params: EditBotParams,
    ) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;

        let mut billing = bot.billing.clone();
        let mut charge = 0;
        if let Some(requested) = &params.permissions {
            let next = self
                .price_permissions(requested, &bot.billing.permissions)
                .await?;
            let days = chargeable_days(bot.expires_at, Utc::now());
            charge = permission_change_charge(&bot.billing.permissions, &next, days);
            billing.permissions = next;
        }
        let template = params.template.unwrap_or_else(|| bot.template.clone());

        let txn = self.begin().await?;
        if let Err(err) = Self::store_edit(&txn, &bot, charge, &template, &billing).await {
            self.rollback(txn, Some(bot.id)).await;
            return Err(err);
        }
        txn.commit().await?;

        info!(family = %self.family, bot_id, charge, "bot configuration changed");
        let edited = Bot {
            template,
            billing,
            ..bot
        };
        self.publish(Some(&requester.username), bot_id, BotEventKind::Edited);

        if edited.is_suspended() {
            return Ok(edited);
        }

        match self.redeploy(&edited).await {
            Ok(status) => {
                self.write_status(&edited, status, Some(&requester.username))
                    .await
            }
            Err(err) => {
                warn!(family = %self.family, bot_id, error = %err, "redeploy after edit failed");
                self.write_status(&edited, ConnectionStatus::Offline, Some(&requester.username))
                    .await?;
                Err(err)
            }
        }
    }

    async fn store_edit(
        txn: &DatabaseTransaction,
        bot: &Bot,
        charge: i64,
        template: &serde_json::Value,
        billing: &BillingSnapshot,
    ) -> Result<(), LifecycleError> {
        if charge > 0 {
            BillingLedger::new(txn)
                .debit(&bot.owner_username, charge)
                .await?;
        }
        BotRepository::new(txn)
            .update_configuration(bot.id, template, billing)
            .await?;
        Ok(())
    }

    /// Replaces the remote bot with the stored configuration.
    ///
    /// # Returns
    /// - `Ok(status)` - `online` if the bot was connected before and reconnected,
    ///   `offline` otherwise
    async fn redeploy(&self, bot: &Bot) -> Result<ConnectionStatus, LifecycleError> {
        let remote = self.remote_for(bot).await?;

        match remote.delete_bot(&bot.template_name).await {
            Ok(()) => {}
            Err(err) if err.code == PanelErrorCode::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.recreate(remote.as_ref(), bot).await?;

        if bot.connection_status == ConnectionStatus::Offline {
            return Ok(ConnectionStatus::Offline);
        }
        self.connect_remote(remote.as_ref(), bot).await?;
        Ok(ConnectionStatus::Online)
    }

    /// Deletes a bot and refunds the unused part of its cycle.
    ///
    /// The panel side is best effort: a panel that is offline or fails the delete is
    /// logged and the local row is removed anyway. The bot's log file is purged.
    ///
    /// # Returns
    /// - `Ok(refund)` - Amount credited to the owner
    pub async fn delete(&self, requester: &Requester, bot_id: i32) -> Result<i64, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;

        match self.remote_for(&bot).await {
            Ok(remote) => {
                if let Err(err) = remote.delete_bot(&bot.template_name).await {
                    warn!(
                        family = %self.family,
                        bot_id,
                        error = %err,
                        "remote delete failed, removing local bot anyway"
                    );
                }
            }
            Err(err) => warn!(
                family = %self.family,
                bot_id,
                error = %err,
                "panel unavailable, removing local bot without remote delete"
            ),
        }

        let refund = refund_amount(&bot.billing, bot.expires_at, Utc::now());

        let txn = self.begin().await?;
        if let Err(err) = Self::remove_in(&txn, &bot, refund).await {
            self.rollback(txn, Some(bot_id)).await;
            return Err(err);
        }
        txn.commit().await?;

        if let Some(panel_id) = bot.panel_id {
            if let Err(err) = PanelRepository::new(self.db)
                .adjust_bot_count(panel_id, -1)
                .await
            {
                warn!(panel_id, error = %err, "failed to lower panel bot count");
            }
        }
        if let Err(err) = self.logs.purge(self.family, &bot.template_name).await {
            warn!(family = %self.family, bot_id, error = %err, "failed to purge bot log");
        }

        info!(family = %self.family, bot_id, refund, "bot deleted");
        self.publish(
            Some(&requester.username),
            bot_id,
            BotEventKind::Deleted { refunded: refund },
        );

        Ok(refund)
    }

    async fn remove_in(
        txn: &DatabaseTransaction,
        bot: &Bot,
        refund: i64,
    ) -> Result<(), LifecycleError> {
        if refund > 0 {
            BillingLedger::new(txn)
                .credit(&bot.owner_username, refund)
                .await?;
        }
        BotRepository::new(txn).delete(bot.id).await?;
        Ok(())
    }

    /// Suspends a bot. Suspending a suspended bot returns it unchanged.
    pub async fn suspend(&self, requester: &Requester, bot_id: i32) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;
        if bot.is_suspended() {
            return Ok(bot);
        }

        self.suspend_bot(&bot, Some(&requester.username)).await
    }

    /// Disconnects `bot` remotely (best effort) and stores it `suspended` and `offline`.
    ///
    /// Skips authorization; used by `suspend` and by the expiration job.
    pub async fn suspend_bot(&self, bot: &Bot, actor: Option<&str>) -> Result<Bot, LifecycleError> {
        match self.remote_for(bot).await {
            Ok(remote) => match remote.disconnect_bot(&bot.template_name).await {
                Ok(()) => {}
                Err(err) if is_disconnected(&err.code) => {}
                Err(err) => warn!(
                    family = %self.family,
                    bot_id = bot.id,
                    error = %err,
                    "remote disconnect failed while suspending"
                ),
            },
            Err(err) => debug!(
                family = %self.family,
                bot_id = bot.id,
                error = %err,
                "panel unavailable while suspending"
            ),
        }

        BotRepository::new(self.db)
            .set_state(bot.id, LifecycleState::Suspended, ConnectionStatus::Offline)
            .await?;

        info!(family = %self.family, bot_id = bot.id, "bot suspended");
        self.publish(actor, bot.id, BotEventKind::Suspended);

        Ok(Bot {
            lifecycle_state: LifecycleState::Suspended,
            connection_status: ConnectionStatus::Offline,
            ..bot.clone()
        })
    }

    /// Lifts a suspension. The bot stays `offline` until connected.
    ///
    /// # Returns
    /// - `Ok(Bot)` - The active bot
    /// - `Err(LifecycleError::Expired)` - The bot must be extended first
    pub async fn activate(&self, requester: &Requester, bot_id: i32) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;
        if !bot.is_suspended() {
            return Ok(bot);
        }
        if let Some(expires_at) = bot.expires_at.filter(|expires_at| *expires_at < Utc::now()) {
            return Err(LifecycleError::Expired(expires_at));
        }

        BotRepository::new(self.db)
            .set_state(bot.id, LifecycleState::Active, ConnectionStatus::Offline)
            .await?;

        info!(family = %self.family, bot_id, "bot activated");
        self.publish(Some(&requester.username), bot_id, BotEventKind::Activated);

        Ok(Bot {
            lifecycle_state: LifecycleState::Active,
            connection_status: ConnectionStatus::Offline,
            ..bot
        })
    }

    /// Buys `cycles` more billing cycles.
    ///
    /// The new expiry counts from the current expiry, or from now if the bot already
    /// expired. Suspended bots may be extended; they stay suspended until activated.
    pub async fn extend(
        &self,
        requester: &Requester,
        bot_id: i32,
        cycles: u32,
    ) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;

        let Some(cycle) = bot.billing.cycle() else {
            return Err(LifecycleError::BadRequest(
                "Unlimited bots cannot be extended".to_string(),
            ));
        };
        let cycles = i32::try_from(cycles)
            .ok()
            .filter(|cycles| *cycles > 0)
            .ok_or_else(|| LifecycleError::BadRequest(format!("Invalid cycle count {}", cycles)))?;

        let now = Utc::now();
        let too_many =
            || LifecycleError::BadRequest(format!("Cannot extend by {} cycles", cycles));
        let cost = bot
            .billing
            .cycle_price()
            .checked_mul(i64::from(cycles))
            .ok_or_else(too_many)?;
        let expires_at = cycle
            .checked_mul(cycles)
            .and_then(|span| {
                bot.expires_at
                    .map_or(now, |expires_at| expires_at.max(now))
                    .checked_add_signed(span)
            })
            .ok_or_else(too_many)?;

        let txn = self.begin().await?;
        if let Err(err) = Self::store_expiry(&txn, &bot, cost, expires_at).await {
            self.rollback(txn, Some(bot_id)).await;
            return Err(err);
        }
        txn.commit().await?;

        info!(family = %self.family, bot_id, cycles, cost, %expires_at, "bot extended");
        self.publish(
            Some(&requester.username),
            bot_id,
            BotEventKind::Extended {
                expires_at: Some(expires_at),
            },
        );

        Ok(Bot {
            expires_at: Some(expires_at),
            ..bot
        })
    }

    /// Charges one cycle and moves the expiry one cycle forward, for the expiration job.
    ///
    /// # Returns
    /// - `Ok(Bot)` - The renewed bot
    /// - `Err(LifecycleError::InsufficientBalance)` - Owner cannot pay; nothing written
    /// - `Err(LifecycleError::BadRequest)` - Unlimited bot
    pub async fn renew_bot(&self, bot: &Bot) -> Result<Bot, LifecycleError> {
        let Some(cycle) = bot.billing.cycle() else {
            return Err(LifecycleError::BadRequest(
                "Unlimited bots do not renew".to_string(),
            ));
        };
        let expires_at = bot
            .expires_at
            .unwrap_or_else(Utc::now)
            .checked_add_signed(cycle)
            .ok_or_else(|| LifecycleError::BadRequest("Expiry out of range".to_string()))?;
        let cost = bot.billing.cycle_price();

        let txn = self.begin().await?;
        if let Err(err) = Self::store_expiry(&txn, bot, cost, expires_at).await {
            self.rollback(txn, Some(bot.id)).await;
            return Err(err);
        }
        txn.commit().await?;

        info!(family = %self.family, bot_id = bot.id, cost, %expires_at, "bot renewed");
        self.publish(
            None,
            bot.id,
            BotEventKind::Extended {
                expires_at: Some(expires_at),
            },
        );

        Ok(Bot {
            expires_at: Some(expires_at),
            ..bot.clone()
        })
    }

    async fn store_expiry(
        txn: &DatabaseTransaction,
        bot: &Bot,
        cost: i64,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        BillingLedger::new(txn)
            .debit(&bot.owner_username, cost)
            .await?;
        BotRepository::new(txn)
            .set_expiry(bot.id, Some(expires_at))
            .await?;
        Ok(())
    }

    pub async fn set_autorenew(
        &self,
        requester: &Requester,
        bot_id: i32,
        enabled: bool,
    ) -> Result<Bot, LifecycleError> {
        let bot = self.load_authorized(requester, bot_id).await?;

        BotRepository::new(self.db)
            .set_autorenew(bot.id, enabled)
            .await?;
        debug!(family = %self.family, bot_id, enabled, "bot autorenew changed");

        Ok(Bot {
            autorenew: enabled,
            ..bot
        })
    }
}
