//! Periodic reconciliation jobs.
//!
//! Each job runs on its own cron pattern. A run that is still going when the next one
//! fires is allowed to overlap: every job writes the full state it observed rather than
//! a delta, so the later run wins and nothing is corrupted. `JobTracker` records and
//! logs such overlaps. A job that starts applying deltas needs a per-job lock instead.

pub mod expiration;
pub mod panel_sync;
pub mod teamspeak;

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::AppError,
    scheduler::{
        expiration::ExpirationService, panel_sync::PanelSyncService,
        teamspeak::TeamSpeakSyncService,
    },
    state::AppState,
};

/// Counts the runs of one job currently in flight.
#[derive(Clone)]
pub struct JobTracker {
    name: &'static str,
    in_flight: Arc<AtomicUsize>,
}

impl JobTracker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Marks a run as started until the returned guard drops.
    pub fn begin(&self) -> RunGuard {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        if previous > 0 {
            warn!(
                job = self.name,
                in_flight = previous,
                "previous run still in flight, running overlapped"
            );
        }
        RunGuard {
            tracker: self.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

pub struct RunGuard {
    tracker: JobTracker,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cron scheduler for the reconciliation jobs.
pub struct JobRunner {
    scheduler: JobScheduler,
}

impl JobRunner {
    pub async fn new() -> Result<Self, AppError> {
        Ok(Self {
            scheduler: JobScheduler::new().await?,
        })
    }

    /// Schedules `run` on `cron`.
    ///
    /// An invalid pattern disables the job with a warning instead of failing.
    ///
    /// # Returns
    /// - `Ok(true)` - Job scheduled
    /// - `Ok(false)` - Invalid cron pattern, job disabled
    /// - `Err(AppError::SchedulerErr)` - The scheduler rejected the job
    pub async fn add<F, Fut>(&self, name: &'static str, cron: &str, run: F) -> Result<bool, AppError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let tracker = JobTracker::new(name);
        let run = Arc::new(run);

        let job = Job::new_async(cron, move |_uuid, _lock| {
            let tracker = tracker.clone();
            let run = run.clone();

            Box::pin(async move {
                let _guard = tracker.begin();
                let started = Instant::now();

                if let Err(err) = run().await {
                    error!(job = name, error = %err, "scheduled job failed");
                }
                debug!(
                    job = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "scheduled job finished"
                );
            })
        });

        let job = match job {
            Ok(job) => job,
            Err(err) => {
                warn!(job = name, cron, error = %err, "invalid cron pattern, job disabled");
                return Ok(false);
            }
        };

        self.scheduler.add(job).await?;
        info!(job = name, cron, "job scheduled");
        Ok(true)
    }

    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(mut self) -> Result<(), AppError> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

/// Schedules every reconciliation job and starts the scheduler.
///
/// The TeamSpeak job is only scheduled when a WebQuery endpoint is configured.
pub async fn start_scheduler(state: AppState, config: &Config) -> Result<JobRunner, AppError> {
    let runner = JobRunner::new().await?;

    let sync_state = state.clone();
    runner
        .add("panel_sync", &config.panel_sync_cron, move || {
            let state = sync_state.clone();
            async move {
                let report = PanelSyncService::new(&state.db, &state.panels, &state.events)
                    .with_timeout(state.rpc_timeout)
                    .sync_all()
                    .await?;
                info!(
                    panels_online = report.panels_online,
                    panels_offline = report.panels_offline,
                    bots_written = report.bots_written,
                    "panel sync finished"
                );
                Ok(())
            }
        })
        .await?;

    let expiration_state = state.clone();
    runner
        .add("expiration", &config.expiration_cron, move || {
            let state = expiration_state.clone();
            async move {
                let report = ExpirationService::new(
                    &state.db,
                    &state.panels,
                    &state.events,
                    &state.logs,
                    state.server_query.as_deref(),
                )
                .run(chrono::Utc::now())
                .await?;
                info!(
                    renewed = report.renewed,
                    suspended = report.suspended,
                    failed = report.failed,
                    "expiration run finished"
                );
                Ok(())
            }
        })
        .await?;

    if state.server_query.is_some() {
        let teamspeak_state = state.clone();
        runner
            .add("teamspeak", &config.teamspeak_cron, move || {
                let state = teamspeak_state.clone();
                async move {
                    let Some(query) = state.server_query.as_deref() else {
                        return Ok(());
                    };
                    let report =
                        TeamSpeakSyncService::new(&state.db, query, &state.server_status)
                            .with_timeout(state.rpc_timeout)
                            .sync_all()
                            .await?;
                    info!(
                        online = report.online,
                        offline = report.offline,
                        corrected = report.corrected,
                        "teamspeak sync finished"
                    );
                    Ok(())
                }
            })
            .await?;
    } else {
        info!("TeamSpeak WebQuery not configured, teamspeak job disabled");
    }

    runner.start().await?;
    info!("reconciliation scheduler started");

    Ok(runner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_overlapping_runs() {
        let tracker = JobTracker::new("test");

        let first = tracker.begin();
        let second = tracker.begin();
        assert_eq!(tracker.in_flight(), 2);

        drop(first);
        drop(second);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn invalid_cron_disables_job() {
        let runner = JobRunner::new().await.unwrap();

        let scheduled = runner
            .add("broken", "not a cron pattern", || async { Ok(()) })
            .await
            .unwrap();

        assert!(!scheduled);
    }

    #[tokio::test]
    async fn valid_cron_schedules_job() {
        let runner = JobRunner::new().await.unwrap();

        let scheduled = runner
            .add("every_minute", "0 * * * * *", || async { Ok(()) })
            .await
            .unwrap();

        assert!(scheduled);
    }
}
