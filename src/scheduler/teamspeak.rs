//! TeamSpeak job: refreshes live client counts and corrects slot drift.

use std::time::Duration;

use futures_util::future::join_all;
use sea_orm::{DatabaseConnection, DbErr};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    data::server::ServerRepository,
    model::server::Server,
    teamspeak::{cache::ServerStatusCache, ServerInfo, ServerQuery},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeamSpeakSyncReport {
    pub online: usize,
    pub offline: usize,
    /// Servers whose slot count was reset to the stored value.
    pub corrected: usize,
}

enum Polled {
    Online { corrected: bool },
    Offline,
}

pub struct TeamSpeakSyncService<'a> {
    db: &'a DatabaseConnection,
    query: &'a dyn ServerQuery,
    cache: &'a ServerStatusCache,
    timeout: Duration,
}

impl<'a> TeamSpeakSyncService<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        query: &'a dyn ServerQuery,
        cache: &'a ServerStatusCache,
    ) -> Self {
        Self {
            db,
            query,
            cache,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Polls every active server concurrently.
    pub async fn sync_all(&self) -> Result<TeamSpeakSyncReport, DbErr> {
        let servers = ServerRepository::new(self.db).get_active().await?;
        let polled = join_all(servers.iter().map(|server| self.sync_server(server))).await;

        let mut report = TeamSpeakSyncReport::default();
        for outcome in polled {
            match outcome {
                Polled::Online { corrected } => {
                    report.online += 1;
                    if corrected {
                        report.corrected += 1;
                    }
                }
                Polled::Offline => report.offline += 1,
            }
        }

        Ok(report)
    }

    async fn sync_server(&self, server: &Server) -> Polled {
        let info = match timeout(self.timeout, self.query.server_info(server.virtual_server_id)).await
        {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                debug!(server_id = server.id, error = %err, "server query failed");
                self.cache.set_offline(server.id);
                return Polled::Offline;
            }
            Err(_) => {
                debug!(server_id = server.id, "server query timed out");
                self.cache.set_offline(server.id);
                return Polled::Offline;
            }
        };

        self.cache.set_online(server.id, info.online_clients);

        Polled::Online {
            corrected: self.correct_slots(server, info).await,
        }
    }

    /// Reissues the stored slot count when the live one drifted.
    async fn correct_slots(&self, server: &Server, info: ServerInfo) -> bool {
        if info.max_clients == server.slots {
            return false;
        }

        match timeout(
            self.timeout,
            self.query
                .set_max_clients(server.virtual_server_id, server.slots),
        )
        .await
        {
            Ok(Ok(())) => {
                info!(
                    server_id = server.id,
                    from = info.max_clients,
                    to = server.slots,
                    "server slots corrected"
                );
                true
            }
            Ok(Err(err)) => {
                warn!(server_id = server.id, error = %err, "failed to correct server slots");
                false
            }
            Err(_) => {
                warn!(server_id = server.id, "timed out correcting server slots");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_utils::{builder::TestBuilder, factory};

    use super::*;
    use crate::teamspeak::fake::FakeServerQuery;

    /// Tests one pass over a reachable, a drifted and a missing server.
    ///
    /// Expected: cache holds live counts, drift is corrected, the missing server is
    /// cached offline
    #[tokio::test]
    async fn caches_counts_and_corrects_drift() -> Result<(), DbErr> {
        let mut test = TestBuilder::new().with_bot_tables().build().await.unwrap();
        let db = test.database().await.unwrap();
        let user = factory::create_user(db).await?;
        let steady = factory::create_server(db, &user.username).await?;
        let drifted = factory::server::ServerFactory::new(db, &user.username)
            .slots(64)
            .build()
            .await?;
        let missing = factory::create_server(db, &user.username).await?;
        let suspended = factory::server::ServerFactory::new(db, &user.username)
            .lifecycle_state("suspended")
            .build()
            .await?;
        let query = FakeServerQuery::new()
            .with_server(steady.virtual_server_id, 5, 32)
            .with_server(drifted.virtual_server_id, 2, 32);
        let cache = ServerStatusCache::new();

        let report = TeamSpeakSyncService::new(db, &query, &cache)
            .sync_all()
            .await?;

        assert_eq!(
            report,
            TeamSpeakSyncReport {
                online: 2,
                offline: 1,
                corrected: 1
            }
        );
        assert_eq!(cache.get(steady.id).unwrap().online_clients, 5);
        assert_eq!(query.info(drifted.virtual_server_id).unwrap().max_clients, 64);
        assert!(!cache.get(missing.id).unwrap().online);
        assert_eq!(cache.get(suspended.id), None);
        assert!(!query
            .calls()
            .contains(&format!("serveredit {}", steady.virtual_server_id)));

        Ok(())
    }
}
