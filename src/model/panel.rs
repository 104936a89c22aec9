//! Remote panel models and parameters.

use std::{fmt, str::FromStr};

use sea_orm::DbErr;

use crate::{error::internal::InternalError, model::bot::BotFamily};

/// Last observed reachability of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Online,
    Offline,
}

impl PanelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for PanelStatus {
    type Err = InternalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(InternalError::InvalidStoredValue {
                column: "panel.status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote bot host.
///
/// `current_bot_count` is a cache refreshed by the panel sync job. It is only used as a
/// soft capacity signal when placing new bots.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: i32,
    pub family: BotFamily,
    pub name: String,
    pub host: String,
    pub token: String,
    pub max_bot_capacity: i32,
    pub current_bot_count: i32,
    pub status: PanelStatus,
}

impl Panel {
    pub fn from_entity(entity: entity::panel::Model) -> Result<Self, DbErr> {
        Ok(Self {
            id: entity.id,
            family: entity.family.parse()?,
            name: entity.name,
            host: entity.host,
            token: entity.token,
            max_bot_capacity: entity.max_bot_capacity,
            current_bot_count: entity.current_bot_count,
            status: entity.status.parse()?,
        })
    }

    pub fn is_online(&self) -> bool {
        self.status == PanelStatus::Online
    }

    /// Whether the panel can take another bot.
    pub fn has_capacity(&self) -> bool {
        self.is_online() && self.current_bot_count < self.max_bot_capacity
    }
}

/// Parameters for registering a panel.
#[derive(Debug, Clone)]
pub struct CreatePanelParams {
    pub family: BotFamily,
    pub name: String,
    pub host: String,
    pub token: String,
    pub max_bot_capacity: i32,
}

/// Panel changes; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdatePanelParams {
    pub name: Option<String>,
    pub host: Option<String>,
    pub token: Option<String>,
    pub max_bot_capacity: Option<i32>,
}
