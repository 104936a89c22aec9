//! Error types.
//!
//! `AppError` is the top-level error for startup and scheduled jobs. Operations invoked
//! by the route layer return `LifecycleError`, whose `code()` is the stable machine
//! readable failure code; this crate never maps errors to HTTP status codes itself.

pub mod billing;
pub mod config;
pub mod internal;
pub mod lifecycle;
pub mod panel;
pub mod query;

use thiserror::Error;

use crate::error::{
    config::ConfigError, internal::InternalError, lifecycle::LifecycleError,
    query::QueryError,
};

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error during startup or environment variable loading.
    #[error(transparent)]
    ConfigErr(#[from] ConfigError),

    /// Database operation error from SeaORM.
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),

    /// HTTP client construction or request error from reqwest.
    #[error(transparent)]
    ReqwestErr(#[from] reqwest::Error),

    /// Cron scheduler error.
    #[error(transparent)]
    SchedulerErr(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// A lifecycle operation invoked from a background job failed.
    #[error(transparent)]
    LifecycleErr(#[from] LifecycleError),

    /// TeamSpeak query collaborator failure.
    #[error(transparent)]
    QueryErr(#[from] QueryError),

    #[error(transparent)]
    InternalErr(#[from] InternalError),

    #[error(transparent)]
    IoErr(#[from] std::io::Error),
}
