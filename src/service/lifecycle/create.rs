use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use sea_orm::{DatabaseTransaction, SqlErr};
use tracing::{error, info, warn};

use crate::{
    data::{
        bot::BotRepository,
        package::{PackageRepository, PermissionPriceRepository},
        panel::PanelRepository,
    },
    error::{lifecycle::LifecycleError, panel::PanelErrorCode},
    model::{
        billing::PermissionGrant,
        bot::{Bot, BotFamily, ConnectionStatus, CreateBotParams, NewBotRecord},
        panel::Panel,
        user::Requester,
    },
    panel::PanelApi,
    service::{billing::BillingLedger, event::BotEventKind},
};

use super::BotLifecycleService;

impl BotLifecycleService<'_> {
    /// Creates a bot, charging one cycle of its package up front.
    ///
    /// The debit, the row insert and the remote create share one transaction: if the
    /// panel rejects the bot, neither the row nor the debit survive. If the commit fails
    /// after the panel accepted the bot, the remote bot is deleted again.
    ///
    /// # Returns
    /// - `Ok(Bot)` - The created bot, `offline` until connected
    /// - `Err(LifecycleError::Forbidden)` - Reseller creating for someone else or
    ///   choosing a panel
    /// - `Err(LifecycleError::DuplicateTemplateName)` - Template name taken in this family
    /// - `Err(LifecycleError::NoAvailablePanel)` - No online panel with capacity
    /// - `Err(LifecycleError::InsufficientBalance)` - Owner cannot pay the first cycle
    pub async fn create(
        &self,
        requester: &Requester,
        params: CreateBotParams,
    ) -> Result<Bot, LifecycleError> {
        let owner = params
            .owner_username
            .clone()
            .unwrap_or_else(|| requester.username.clone());
        if !requester.is_admin() && (owner != requester.username || params.panel_id.is_some()) {
            return Err(LifecycleError::Forbidden);
        }

        let template_name = params.template_name.trim().to_string();
        if template_name.is_empty() {
            return Err(LifecycleError::BadRequest(
                "Template name must not be empty".to_string(),
            ));
        }
        if BotRepository::new(self.db)
            .template_name_exists(self.family, &template_name)
            .await?
        {
            return Err(LifecycleError::DuplicateTemplateName(template_name));
        }

        let package = PackageRepository::new(self.db)
            .get_by_id(params.package_id)
            .await?
            .filter(|package| package.family == self.family)
            .ok_or_else(|| LifecycleError::NotFound(format!("Package {}", params.package_id)))?;

        let mut billing = package.snapshot();
        billing.permissions = self
            .price_permissions(&params.permissions, &BTreeMap::new())
            .await?;

        let (panel, remote) = self.place(params.panel_id).await?;

        let record = NewBotRecord {
            family: self.family,
            template_name,
            owner_username: owner,
            panel_id: panel.as_ref().map(|panel| panel.id),
            package_id: Some(package.id),
            connection_status: ConnectionStatus::Offline,
            expires_at: billing.cycle().map(|cycle| Utc::now() + cycle),
            autorenew: params.autorenew,
            template: params.template,
            billing,
        };

        let txn = self.begin().await?;
        let bot = match self.create_in(&txn, remote.as_ref(), &requester.username, record).await {
            Ok(bot) => bot,
            Err(err) => {
                self.rollback(txn, None).await;
                return Err(err);
            }
        };

        if let Err(err) = txn.commit().await {
            error!(
                family = %self.family,
                bot_id = bot.id,
                error = %err,
                "commit failed after remote create, deleting remote bot"
            );
            if let Err(cleanup) = remote.delete_bot(&bot.template_name).await {
                error!(
                    family = %self.family,
                    bot_id = bot.id,
                    error = %cleanup,
                    "failed to delete orphaned remote bot"
                );
            }
            return Err(err.into());
        }

        if let Some(panel) = &panel {
            if let Err(err) = PanelRepository::new(self.db)
                .adjust_bot_count(panel.id, 1)
                .await
            {
                warn!(panel_id = panel.id, error = %err, "failed to bump panel bot count");
            }
        }

        info!(
            family = %self.family,
            bot_id = bot.id,
            owner = %bot.owner_username,
            panel_id = bot.panel_id,
            "bot created"
        );
        self.publish(Some(&requester.username), bot.id, BotEventKind::Created);

        Ok(bot)
    }

    /// Debits the first cycle, inserts the row and creates the bot remotely, all on `txn`.
    async fn create_in(
        &self,
        txn: &DatabaseTransaction,
        remote: &dyn PanelApi,
        actor: &str,
        record: NewBotRecord,
    ) -> Result<Bot, LifecycleError> {
        BillingLedger::new(txn)
            .debit(&record.owner_username, record.billing.cycle_price())
            .await?;

        let template_name = record.template_name.clone();
        let bot = BotRepository::new(txn).create(record).await.map_err(|err| {
            match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    LifecycleError::DuplicateTemplateName(template_name.clone())
                }
                _ => err.into(),
            }
        })?;

        self.progress(actor, "Creating bot on panel");

        remote
            .create_bot(&bot.remote_template())
            .await
            .map_err(|err| match err.code {
                PanelErrorCode::AlreadyAdded => {
                    LifecycleError::DuplicateTemplateName(bot.template_name.clone())
                }
                _ => err.into(),
            })?;

        Ok(bot)
    }

    /// Chooses the panel for a new bot.
    ///
    /// Rank systems always use the singleton panel. Otherwise an admin-chosen panel must
    /// belong to this family and be online; without a choice the oldest online panel
    /// with free capacity is used.
    async fn place(
        &self,
        panel_id: Option<i32>,
    ) -> Result<(Option<Panel>, Arc<dyn PanelApi>), LifecycleError> {
        if self.family.has_singleton_panel() {
            return Ok((None, self.rank_remote()?));
        }

        let panels = PanelRepository::new(self.db);
        let panel = match panel_id {
            Some(panel_id) => panels
                .get_by_id(panel_id)
                .await?
                .filter(|panel| panel.family == self.family)
                .ok_or_else(|| LifecycleError::NotFound(format!("Panel {}", panel_id)))?,
            None => panels
                .find_available(self.family)
                .await?
                .ok_or(LifecycleError::NoAvailablePanel)?,
        };

        let remote = self.remote_for_panel(&panel)?;
        Ok((Some(panel), remote))
    }

    /// Prices the requested permission set.
    ///
    /// Permissions already held keep the unit price they were granted at; new ones use
    /// the current price list. Zero quantities drop the permission.
    pub(super) async fn price_permissions(
        &self,
        requested: &BTreeMap<String, u32>,
        held: &BTreeMap<String, PermissionGrant>,
    ) -> Result<BTreeMap<String, PermissionGrant>, LifecycleError> {
        let requested: BTreeMap<&String, u32> = requested
            .iter()
            .filter(|(_, quantity)| **quantity > 0)
            .map(|(key, quantity)| (key, *quantity))
            .collect();
        if requested.is_empty() {
            return Ok(BTreeMap::new());
        }
        if self.family != BotFamily::ManagerBot {
            return Err(LifecycleError::BadRequest(format!(
                "{} bots have no permissions",
                self.family
            )));
        }

        let prices = PermissionPriceRepository::new(self.db)
            .get_by_keys(requested.keys().map(|key| key.to_string()))
            .await?;

        let mut grants = BTreeMap::new();
        for (key, quantity) in requested {
            let (unit_price, multi) = match held.get(key) {
                Some(grant) => (grant.unit_price, grant.multi),
                None => {
                    let price = prices
                        .iter()
                        .find(|price| &price.key == key)
                        .ok_or_else(|| {
                            LifecycleError::BadRequest(format!("Unknown permission '{}'", key))
                        })?;
                    (price.price, price.multi_valued)
                }
            };

            if !multi && quantity > 1 {
                return Err(LifecycleError::BadRequest(format!(
                    "Permission '{}' cannot be granted more than once",
                    key
                )));
            }

            grants.insert(
                key.clone(),
                PermissionGrant {
                    unit_price,
                    quantity,
                    multi,
                },
            );
        }

        Ok(grants)
    }
}
