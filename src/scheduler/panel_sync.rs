//! Reconciles local bot status with what each panel reports.
//!
//! Every pass polls all panels concurrently. A panel that answers has every local bot
//! on it overwritten with the reported status (unreported bots become `offline`) and is
//! marked `online` with its reported bot count. A panel that fails is marked `offline`
//! together with all its bots. Suspended bots are always written `offline`; one reported
//! connected is disconnected on the panel.

use std::{collections::HashMap, time::Duration};

use futures_util::future::join_all;
use sea_orm::{DatabaseConnection, DbErr};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    data::{bot::BotRepository, panel::PanelRepository},
    error::panel::PanelError,
    model::{
        bot::{Bot, BotFamily, ConnectionStatus, RemoteBot},
        panel::Panel,
    },
    panel::{directory::PanelDirectory, PanelApi, PanelResult},
    service::event::{BotEvent, BotEventKind, EventBus},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one sync pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub panels_online: usize,
    pub panels_offline: usize,
    /// Bot rows written, including unchanged ones.
    pub bots_written: u64,
}

impl SyncReport {
    fn add(&mut self, outcome: PanelOutcome) {
        if outcome.online {
            self.panels_online += 1;
        } else {
            self.panels_offline += 1;
        }
        self.bots_written += outcome.bots_written;
    }
}

#[derive(Debug, Clone, Copy)]
struct PanelOutcome {
    online: bool,
    bots_written: u64,
}

pub struct PanelSyncService<'a> {
    db: &'a DatabaseConnection,
    panels: &'a PanelDirectory,
    events: &'a EventBus,
    timeout: Duration,
}

impl<'a> PanelSyncService<'a> {
    pub fn new(db: &'a DatabaseConnection, panels: &'a PanelDirectory, events: &'a EventBus) -> Self {
        Self {
            db,
            panels,
            events,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Upper bound for one panel's `getBotList`, on top of the transport's own timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Syncs every audio and manager panel, then the rank panel if initialized.
    ///
    /// Panels are independent: a failing panel only affects its own bots. Only a
    /// database failure aborts that panel's sync, and it is logged rather than
    /// returned so the other panels still complete.
    pub async fn sync_all(&self) -> Result<SyncReport, DbErr> {
        let repo = PanelRepository::new(self.db);
        let mut panels = Vec::new();
        for family in BotFamily::ALL {
            if !family.has_singleton_panel() {
                panels.extend(repo.get_by_family(family).await?);
            }
        }

        let outcomes = join_all(panels.iter().map(|panel| self.sync_panel(panel))).await;

        let mut report = SyncReport::default();
        for (panel, outcome) in panels.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => report.add(outcome),
                Err(err) => {
                    warn!(family = %panel.family, panel_id = panel.id, error = %err, "panel sync failed")
                }
            }
        }

        if self.panels.rank.is_initialized() {
            match self.sync_rank().await {
                Ok(outcome) => report.add(outcome),
                Err(err) => warn!(family = %BotFamily::RankSystem, error = %err, "rank panel sync failed"),
            }
        } else {
            debug!("rank panel not initialized, skipping");
        }

        Ok(report)
    }

    async fn sync_panel(&self, panel: &Panel) -> Result<PanelOutcome, DbErr> {
        let panel_repo = PanelRepository::new(self.db);
        let bot_repo = BotRepository::new(self.db);

        let listing = match self.panels.for_panel(panel) {
            Ok(Some(api)) => self.list(api.as_ref()).await.map(|remote| (api, remote)),
            Ok(None) => Err(PanelError::unreachable("no connection registered")),
            Err(err) => Err(err),
        };

        match listing {
            Ok((api, remote)) => {
                let bots = bot_repo.get_by_panel(panel.id).await?;
                let count = i32::try_from(remote.len()).unwrap_or(i32::MAX);
                let bots_written = self.apply(api.as_ref(), panel.family, &bots, remote).await?;
                panel_repo.mark_online(panel.id, count).await?;
                if !panel.is_online() {
                    info!(family = %panel.family, panel_id = panel.id, "panel back online");
                }

                Ok(PanelOutcome {
                    online: true,
                    bots_written,
                })
            }
            Err(err) => {
                if panel.is_online() {
                    warn!(family = %panel.family, panel_id = panel.id, error = %err, "panel went offline");
                } else {
                    debug!(family = %panel.family, panel_id = panel.id, error = %err, "panel still offline");
                }
                panel_repo.mark_offline(panel.id).await?;
                let bots_written = bot_repo.set_offline_for_panel(panel.id).await?;

                Ok(PanelOutcome {
                    online: false,
                    bots_written,
                })
            }
        }
    }

    async fn sync_rank(&self) -> Result<PanelOutcome, DbErr> {
        let bot_repo = BotRepository::new(self.db);
        let family = BotFamily::RankSystem;

        let listing = match self.panels.rank.get() {
            Ok(api) => self.list(api.as_ref()).await.map(|remote| (api, remote)),
            Err(err) => Err(err),
        };

        match listing {
            Ok((api, remote)) => {
                let bots = bot_repo.get_by_family(family, None).await?;
                let bots_written = self.apply(api.as_ref(), family, &bots, remote).await?;
                Ok(PanelOutcome {
                    online: true,
                    bots_written,
                })
            }
            Err(err) => {
                warn!(family = %family, error = %err, "rank panel unreachable");
                let bots_written = bot_repo.set_offline_for_family(family).await?;
                Ok(PanelOutcome {
                    online: false,
                    bots_written,
                })
            }
        }
    }

    async fn list(&self, api: &dyn PanelApi) -> PanelResult<Vec<RemoteBot>> {
        timeout(self.timeout, api.bot_list())
            .await
            .unwrap_or_else(|_| Err(PanelError::timeout("getBotList")))
    }

    /// Writes the reported status of every local bot on a reachable panel.
    async fn apply(
        &self,
        api: &dyn PanelApi,
        family: BotFamily,
        bots: &[Bot],
        remote: Vec<RemoteBot>,
    ) -> Result<u64, DbErr> {
        let reported: HashMap<String, ConnectionStatus> = remote
            .into_iter()
            .map(|bot| (bot.template_name, bot.status))
            .collect();

        let mut by_status: HashMap<ConnectionStatus, Vec<i32>> = HashMap::new();
        let mut changed = Vec::new();
        for bot in bots {
            let status = reported
                .get(&bot.template_name)
                .copied()
                .unwrap_or(ConnectionStatus::Offline);

            let status = if bot.is_suspended() {
                if status != ConnectionStatus::Offline {
                    self.disconnect_suspended(api, bot).await;
                }
                ConnectionStatus::Offline
            } else {
                status
            };

            if status != bot.connection_status {
                changed.push((bot.id, status));
            }
            by_status.entry(status).or_default().push(bot.id);
        }

        let repo = BotRepository::new(self.db);
        let mut written = 0;
        for (status, ids) in by_status {
            written += repo.set_connection_status_for_ids(&ids, status).await?;
        }

        for (bot_id, status) in changed {
            debug!(family = %family, bot_id, status = status.as_str(), "bot status reconciled");
            self.events.publish(BotEvent {
                actor: None,
                family,
                bot_id: Some(bot_id),
                kind: BotEventKind::StatusChanged { status },
            });
        }

        Ok(written)
    }

    async fn disconnect_suspended(&self, api: &dyn PanelApi, bot: &Bot) {
        warn!(
            family = %bot.family,
            bot_id = bot.id,
            "suspended bot reported connected, disconnecting"
        );
        match timeout(self.timeout, api.disconnect_bot(&bot.template_name)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(bot_id = bot.id, error = %err, "failed to disconnect suspended bot"),
            Err(_) => warn!(bot_id = bot.id, "timed out disconnecting suspended bot"),
        }
    }
}
