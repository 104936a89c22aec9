//! Expiration job: auto-renews or suspends expired bots and servers.
//!
//! Every expired row is handled on its own. A row whose renewal fails for a business
//! reason, such as an owner who cannot pay, is suspended. A row that hits a database
//! or internal error is left active and retried on the next run.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use tracing::{debug, error, info, warn};

use crate::{
    data::{bot::BotRepository, server::ServerRepository},
    error::{billing::LedgerError, lifecycle::LifecycleError},
    model::{
        bot::{Bot, LifecycleState},
        server::Server,
    },
    panel::directory::PanelDirectory,
    service::{
        billing::BillingLedger, bot_log::BotLogStore, event::EventBus,
        lifecycle::BotLifecycleService,
    },
    teamspeak::ServerQuery,
};

/// Rows expired at the same time. Each one may wait on a remote call.
const MAX_CONCURRENT_ROWS: usize = 16;

/// Outcome of one expiration run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationReport {
    pub renewed: usize,
    pub suspended: usize,
    /// Rows left untouched because of an unexpected error.
    pub failed: usize,
}

enum Outcome {
    Renewed,
    Suspended,
    Failed,
}

impl ExpirationReport {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Renewed => self.renewed += 1,
            Outcome::Suspended => self.suspended += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

pub struct ExpirationService<'a> {
    db: &'a DatabaseConnection,
    panels: &'a PanelDirectory,
    events: &'a EventBus,
    logs: &'a BotLogStore,
    query: Option<&'a dyn ServerQuery>,
}

impl<'a> ExpirationService<'a> {
    /// `query` stops the virtual servers of suspended server rows; without it servers
    /// are only suspended locally.
    pub fn new(
        db: &'a DatabaseConnection,
        panels: &'a PanelDirectory,
        events: &'a EventBus,
        logs: &'a BotLogStore,
        query: Option<&'a dyn ServerQuery>,
    ) -> Self {
        Self {
            db,
            panels,
            events,
            logs,
            query,
        }
    }

    /// Processes every active bot and server that expired before `now`.
    ///
    /// # Returns
    /// - `Ok(ExpirationReport)` - Per-row outcomes
    /// - `Err(DbErr)` - The expired rows could not be loaded
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ExpirationReport, DbErr> {
        let bots = BotRepository::new(self.db).get_expired(now).await?;
        let servers = ServerRepository::new(self.db).get_expired(now).await?;

        let bot_outcomes: Vec<Outcome> = stream::iter(bots)
            .map(|bot| async move { self.expire_bot(&bot).await })
            .buffer_unordered(MAX_CONCURRENT_ROWS)
            .collect()
            .await;
        let server_outcomes: Vec<Outcome> = stream::iter(servers)
            .map(|server| async move { self.expire_server(&server, now).await })
            .buffer_unordered(MAX_CONCURRENT_ROWS)
            .collect()
            .await;

        let mut report = ExpirationReport::default();
        for outcome in bot_outcomes.into_iter().chain(server_outcomes) {
            report.add(outcome);
        }

        Ok(report)
    }

    async fn expire_bot(&self, bot: &Bot) -> Outcome {
        let service =
            BotLifecycleService::new(bot.family, self.db, self.panels, self.events, self.logs);

        if bot.autorenew {
            match service.renew_bot(bot).await {
                Ok(_) => return Outcome::Renewed,
                Err(err) if is_business_failure(&err) => {
                    info!(
                        family = %bot.family,
                        bot_id = bot.id,
                        reason = %err,
                        "auto-renew failed, suspending"
                    );
                }
                Err(err) => {
                    error!(family = %bot.family, bot_id = bot.id, error = %err, "auto-renew failed");
                    return Outcome::Failed;
                }
            }
        }

        match service.suspend_bot(bot, None).await {
            Ok(_) => Outcome::Suspended,
            Err(err) => {
                error!(family = %bot.family, bot_id = bot.id, error = %err, "failed to suspend expired bot");
                Outcome::Failed
            }
        }
    }

    async fn expire_server(&self, server: &Server, now: DateTime<Utc>) -> Outcome {
        let renewable = server.billing.cycle().filter(|_| server.autorenew);
        if let Some(cycle) = renewable {
            let Some(expires_at) = server.expires_at.unwrap_or(now).checked_add_signed(cycle) else {
                error!(server_id = server.id, "renewed expiry out of range");
                return Outcome::Failed;
            };
            match self.renew_server(server, expires_at).await {
                Ok(expires_at) => {
                    info!(server_id = server.id, %expires_at, "server renewed");
                    return Outcome::Renewed;
                }
                Err(
                    err @ (LedgerError::InsufficientBalance { .. }
                    | LedgerError::AccountNotFound(_)
                    | LedgerError::InvalidAmount(_)),
                ) => {
                    info!(server_id = server.id, reason = %err, "server auto-renew failed, suspending");
                }
                Err(err) => {
                    error!(server_id = server.id, error = %err, "server auto-renew failed");
                    return Outcome::Failed;
                }
            }
        }

        match self.query {
            Some(query) => {
                if let Err(err) = query.stop_server(server.virtual_server_id).await {
                    warn!(server_id = server.id, error = %err, "failed to stop expired server");
                }
            }
            None => debug!(server_id = server.id, "no server query configured, suspending locally"),
        }

        match ServerRepository::new(self.db)
            .set_lifecycle(server.id, LifecycleState::Suspended)
            .await
        {
            Ok(()) => {
                info!(server_id = server.id, "server suspended");
                Outcome::Suspended
            }
            Err(err) => {
                error!(server_id = server.id, error = %err, "failed to suspend expired server");
                Outcome::Failed
            }
        }
    }

    /// Debits one cycle and moves the expiry one cycle forward, atomically.
    async fn renew_server(
        &self,
        server: &Server,
        expires_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, LedgerError> {
        let txn = self.db.begin().await?;
        let renewed = async {
            BillingLedger::new(&txn)
                .debit(&server.owner_username, server.billing.cycle_price())
                .await?;
            ServerRepository::new(&txn)
                .set_expiry(server.id, Some(expires_at))
                .await?;
            Ok::<_, LedgerError>(())
        }
        .await;

        match renewed {
            Ok(()) => {
                txn.commit().await?;
                Ok(expires_at)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    error!(server_id = server.id, error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Failures that mean the row cannot be renewed, as opposed to transient errors.
fn is_business_failure(err: &LifecycleError) -> bool {
    matches!(
        err,
        LifecycleError::InsufficientBalance { .. }
            | LifecycleError::NotFound(_)
            | LifecycleError::BadRequest(_)
    )
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Instant};

    use chrono::Duration;
    use sea_orm::EntityTrait;
    use test_utils::{builder::TestBuilder, context::TestContext, factory};

    use super::*;
    use crate::{
        data::user::UserRepository,
        error::panel::PanelError,
        model::bot::{ConnectionStatus, RemoteBot},
        panel::{
            fake::{FakeConnector, FakePanel},
            PanelApi, PanelResult,
        },
        teamspeak::fake::FakeServerQuery,
    };

    struct Fixture {
        test: TestContext,
        panels: PanelDirectory,
        events: EventBus,
        logs: BotLogStore,
        _log_dir: tempfile::TempDir,
    }

    impl Fixture {
        async fn new() -> Self {
            let log_dir = tempfile::tempdir().unwrap();
            Self {
                test: TestBuilder::new().with_bot_tables().build().await.unwrap(),
                panels: PanelDirectory::new(Arc::new(FakeConnector::new())),
                events: EventBus::new(16),
                logs: BotLogStore::new(log_dir.path()),
                _log_dir: log_dir,
            }
        }

        fn db(&self) -> &DatabaseConnection {
            self.test.db.as_ref().unwrap()
        }

        fn service<'a>(&'a self, query: Option<&'a dyn ServerQuery>) -> ExpirationService<'a> {
            ExpirationService::new(self.db(), &self.panels, &self.events, &self.logs, query)
        }

        async fn balance(&self, username: &str) -> i64 {
            UserRepository::new(self.db())
                .get_by_username(username)
                .await
                .unwrap()
                .unwrap()
                .balance
        }
    }

    /// Tests auto-renew with enough balance.
    ///
    /// Expected: one cycle debited, expiry advanced one cycle from the old expiry,
    /// bot still active
    #[tokio::test]
    async fn autorenew_debits_and_advances_expiry() -> Result<(), DbErr> {
        let fixture = Fixture::new().await;
        let db = fixture.db();
        let user = factory::user::UserFactory::new(db).balance(5_000).build().await?;
        let expired = Utc::now() - Duration::days(1);
        let bot = factory::bot::BotFactory::new(db, &user.username, "rank_system")
            .expires_at(Some(expired))
            .autorenew(true)
            .build()
            .await?;

        let before = BotRepository::new(db).get_by_id(bot.id).await?.unwrap();

        let report = fixture.service(None).run(Utc::now()).await?;

        assert_eq!(report.renewed, 1);
        let stored = BotRepository::new(db).get_by_id(bot.id).await?.unwrap();
        assert_eq!(stored.lifecycle_state, LifecycleState::Active);
        assert_eq!(
            stored.expires_at,
            before.expires_at.map(|at| at + Duration::days(30))
        );
        assert_eq!(fixture.balance(&user.username).await, 2_000);

        Ok(())
    }

    /// Tests auto-renew when the owner cannot pay.
    ///
    /// Expected: nothing debited, bot suspended and offline, disconnected remotely
    #[tokio::test]
    async fn insufficient_balance_suspends() -> Result<(), DbErr> {
        let fixture = Fixture::new().await;
        let db = fixture.db();
        let user = factory::user::UserFactory::new(db).balance(100).build().await?;
        let panel = factory::create_panel(db, "manager_bot").await?;
        let bot = factory::bot::BotFactory::new(db, &user.username, "manager_bot")
            .panel_id(Some(panel.id))
            .connection_status("online")
            .expires_at(Some(Utc::now() - Duration::hours(2)))
            .autorenew(true)
            .build()
            .await?;
        let fake = Arc::new(FakePanel::new().with_bot(&bot.template_name, ConnectionStatus::Online));
        fixture.panels.manager.register(panel.id, fake.clone());

        let report = fixture.service(None).run(Utc::now()).await?;

        assert_eq!(report.suspended, 1);
        let stored = BotRepository::new(db).get_by_id(bot.id).await?.unwrap();
        assert_eq!(stored.lifecycle_state, LifecycleState::Suspended);
        assert_eq!(stored.connection_status, ConnectionStatus::Offline);
        assert_eq!(fixture.balance(&user.username).await, 100);
        assert_eq!(fake.status_of(&bot.template_name), Some(ConnectionStatus::Offline));

        Ok(())
    }

    /// Tests rows that are not due or not active.
    ///
    /// Expected: untouched; expired bots without auto-renew are suspended even when
    /// their panel is gone
    #[tokio::test]
    async fn only_expired_active_rows_are_processed() -> Result<(), DbErr> {
        let fixture = Fixture::new().await;
        let db = fixture.db();
        let user = factory::create_user(db).await?;
        let current = factory::create_bot(db, &user.username, "audio_bot", None).await?;
        let unlimited = factory::bot::BotFactory::new(db, &user.username, "audio_bot")
            .expires_at(None)
            .build()
            .await?;
        let already = factory::bot::BotFactory::new(db, &user.username, "audio_bot")
            .lifecycle_state("suspended")
            .expires_at(Some(Utc::now() - Duration::days(3)))
            .build()
            .await?;
        let lapsed = factory::bot::BotFactory::new(db, &user.username, "audio_bot")
            .expires_at(Some(Utc::now() - Duration::days(3)))
            .build()
            .await?;

        let report = fixture.service(None).run(Utc::now()).await?;

        assert_eq!(
            report,
            ExpirationReport {
                renewed: 0,
                suspended: 1,
                failed: 0
            }
        );
        let repo = BotRepository::new(db);
        for id in [current.id, unlimited.id] {
            assert_eq!(
                repo.get_by_id(id).await?.unwrap().lifecycle_state,
                LifecycleState::Active
            );
        }
        assert!(repo.get_by_id(already.id).await?.unwrap().is_suspended());
        assert!(repo.get_by_id(lapsed.id).await?.unwrap().is_suspended());

        Ok(())
    }

    /// Tests one failing renewal among several.
    ///
    /// Expected: the others are still renewed
    #[tokio::test]
    async fn rows_are_independent() -> Result<(), DbErr> {
        let fixture = Fixture::new().await;
        let db = fixture.db();
        let rich = factory::user::UserFactory::new(db).balance(10_000).build().await?;
        let poor = factory::user::UserFactory::new(db).balance(0).build().await?;
        let expired = Some(Utc::now() - Duration::days(1));
        let poor_bot = factory::bot::BotFactory::new(db, &poor.username, "rank_system")
            .expires_at(expired)
            .autorenew(true)
            .build()
            .await?;
        let rich_bot = factory::bot::BotFactory::new(db, &rich.username, "rank_system")
            .expires_at(expired)
            .autorenew(true)
            .build()
            .await?;

        let report = fixture.service(None).run(Utc::now()).await?;

        assert_eq!(report.renewed, 1);
        assert_eq!(report.suspended, 1);
        let repo = BotRepository::new(db);
        assert!(repo.get_by_id(poor_bot.id).await?.unwrap().is_suspended());
        assert!(!repo.get_by_id(rich_bot.id).await?.unwrap().is_suspended());

        Ok(())
    }

    /// Tests server rows.
    ///
    /// Expected: a paying server is renewed; a server without auto-renew is stopped
    /// and suspended
    #[tokio::test]
    async fn servers_renew_or_stop() -> Result<(), DbErr> {
        let fixture = Fixture::new().await;
        let db = fixture.db();
        let user = factory::user::UserFactory::new(db).balance(3_000).build().await?;
        let expired = Some(Utc::now() - Duration::days(1));
        let renewing = factory::server::ServerFactory::new(db, &user.username)
            .expires_at(expired)
            .autorenew(true)
            .build()
            .await?;
        let lapsing = factory::server::ServerFactory::new(db, &user.username)
            .expires_at(expired)
            .build()
            .await?;
        let query = FakeServerQuery::new().with_server(lapsing.virtual_server_id, 3, 32);
        let repo = ServerRepository::new(db);
        let before = repo.get_by_id(renewing.id).await?.unwrap();

        let report = fixture.service(Some(&query)).run(Utc::now()).await?;

        assert_eq!(report.renewed, 1);
        assert_eq!(report.suspended, 1);
        let renewed = repo.get_by_id(renewing.id).await?.unwrap();
        assert_eq!(renewed.lifecycle_state, LifecycleState::Active);
        assert_eq!(
            renewed.expires_at,
            before.expires_at.map(|at| at + Duration::days(30))
        );
        assert_eq!(fixture.balance(&user.username).await, 0);
        assert_eq!(
            repo.get_by_id(lapsing.id).await?.unwrap().lifecycle_state,
            LifecycleState::Suspended
        );
        assert_eq!(
            query.calls(),
            vec![format!("serverstop {}", lapsing.virtual_server_id)]
        );

        Ok(())
    }

    /// Tests an expired row whose billing snapshot no longer parses.
    ///
    /// Expected: the run succeeds and the readable expired bot is still suspended
    #[tokio::test]
    async fn unreadable_rows_do_not_block_the_run() -> Result<(), DbErr> {
        let fixture = Fixture::new().await;
        let db = fixture.db();
        let user = factory::create_user(db).await?;
        let expired = Some(Utc::now() - Duration::days(1));
        let corrupt = factory::bot::BotFactory::new(db, &user.username, "rank_system")
            .expires_at(expired)
            .billing_snapshot(serde_json::json!({ "amount": "legacy" }))
            .build()
            .await?;
        let good = factory::bot::BotFactory::new(db, &user.username, "rank_system")
            .expires_at(expired)
            .build()
            .await?;

        let report = fixture.service(None).run(Utc::now()).await?;

        assert_eq!(report.suspended, 1);
        let stored = BotRepository::new(db).get_by_id(good.id).await?.unwrap();
        assert_eq!(stored.lifecycle_state, LifecycleState::Suspended);
        let untouched = entity::prelude::Bot::find_by_id(corrupt.id)
            .one(db)
            .await?
            .unwrap();
        assert_eq!(untouched.lifecycle_state, "active");

        Ok(())
    }

    /// Tests several expired bots on a panel whose disconnects are slow.
    ///
    /// Expected: the disconnects overlap, so the run takes about one call, not four
    #[tokio::test]
    async fn expired_rows_are_handled_concurrently() -> Result<(), DbErr> {
        struct Slow;

        #[async_trait::async_trait]
        impl PanelApi for Slow {
            async fn create_bot(&self, _: &crate::model::bot::BotTemplate) -> PanelResult<()> {
                Ok(())
            }
            async fn delete_bot(&self, _: &str) -> PanelResult<()> {
                Ok(())
            }
            async fn connect_bot(&self, _: &str) -> PanelResult<()> {
                Ok(())
            }
            async fn disconnect_bot(&self, _: &str) -> PanelResult<()> {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                Ok(())
            }
            async fn reconnect_bot(&self, _: &str) -> PanelResult<()> {
                Ok(())
            }
            async fn bot_info(&self, name: &str) -> PanelResult<RemoteBot> {
                Err(PanelError::new(crate::error::panel::PanelErrorCode::NotFound, name))
            }
            async fn bot_list(&self) -> PanelResult<Vec<RemoteBot>> {
                Ok(Vec::new())
            }
        }

        let fixture = Fixture::new().await;
        let db = fixture.db();
        let user = factory::create_user(db).await?;
        let panel = factory::create_panel(db, "manager_bot").await?;
        fixture.panels.manager.register(panel.id, Arc::new(Slow));
        for _ in 0..4 {
            factory::bot::BotFactory::new(db, &user.username, "manager_bot")
                .panel_id(Some(panel.id))
                .connection_status("online")
                .expires_at(Some(Utc::now() - Duration::hours(1)))
                .build()
                .await?;
        }

        let started = Instant::now();
        let report = fixture.service(None).run(Utc::now()).await?;

        assert_eq!(report.suspended, 4);
        assert!(
            started.elapsed() < std::time::Duration::from_millis(900),
            "took {:?}",
            started.elapsed()
        );

        Ok(())
    }
}
