//! Remote panel access.
//!
//! Every bot family talks to its panels through the `PanelApi` trait, whatever the
//! transport underneath:
//!
//! - manager-bot panels and the single rank-system panel keep a persistent,
//!   auto-reconnecting socket (`PanelConnection`) held in a `PanelRegistry` or the
//!   `RankPanel` singleton
//! - audio-bot panels are plain HTTP APIs called per operation (`AudioPanelClient`)
//!
//! Both transports normalise failures to `PanelError`, so callers have one error shape.

pub mod audio;
pub mod backoff;
pub mod connection;
pub mod directory;
pub mod frame;
pub mod registry;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::{
    error::panel::PanelError,
    model::bot::{BotTemplate, RemoteBot},
};

pub type PanelResult<T> = Result<T, PanelError>;

/// Operations a remote panel offers for the bots it hosts.
///
/// Bots are addressed by template name. Every call either completes with the panel's
/// acknowledgement or fails; none of them queue while the panel is unreachable.
#[async_trait]
pub trait PanelApi: Send + Sync {
    async fn create_bot(&self, template: &BotTemplate) -> PanelResult<()>;

    async fn delete_bot(&self, template_name: &str) -> PanelResult<()>;

    async fn connect_bot(&self, template_name: &str) -> PanelResult<()>;

    async fn disconnect_bot(&self, template_name: &str) -> PanelResult<()>;

    async fn reconnect_bot(&self, template_name: &str) -> PanelResult<()>;

    async fn bot_info(&self, template_name: &str) -> PanelResult<RemoteBot>;

    /// Authoritative list of every bot on the panel with its current status.
    async fn bot_list(&self) -> PanelResult<Vec<RemoteBot>>;

    /// Tears down any live connection. Stateless transports have nothing to release.
    fn dispose(&self) {}
}
