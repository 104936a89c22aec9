//! Bot domain models shared by every bot family.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde::Serialize;

use crate::{error::internal::InternalError, model::billing::BillingSnapshot};

/// Product family a bot belongs to.
///
/// Audio bots live on HTTP panels; manager bots and rank systems live on socket
/// panels, the rank system on a single process-wide panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotFamily {
    AudioBot,
    ManagerBot,
    RankSystem,
}

impl BotFamily {
    pub const ALL: [BotFamily; 3] = [Self::AudioBot, Self::ManagerBot, Self::RankSystem];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioBot => "audio_bot",
            Self::ManagerBot => "manager_bot",
            Self::RankSystem => "rank_system",
        }
    }

    /// Whether panels of this family keep a persistent socket connection.
    pub fn uses_socket(&self) -> bool {
        !matches!(self, Self::AudioBot)
    }

    /// Whether bots of this family are placed on one implicit panel rather than a
    /// panel row chosen at creation.
    pub fn has_singleton_panel(&self) -> bool {
        matches!(self, Self::RankSystem)
    }
}

impl FromStr for BotFamily {
    type Err = InternalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "audio_bot" => Ok(Self::AudioBot),
            "manager_bot" => Ok(Self::ManagerBot),
            "rank_system" => Ok(Self::RankSystem),
            other => Err(InternalError::InvalidStoredValue {
                column: "family",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BotFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing/permission state, set by users and admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Suspended,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl FromStr for LifecycleState {
    type Err = InternalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            other => Err(InternalError::InvalidStoredValue {
                column: "lifecycle_state",
                value: other.to_string(),
            }),
        }
    }
}

/// Observed runtime state, set by reconciliation and lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Offline,
    Connecting,
    Online,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::Online => "online",
        }
    }

    /// Maps the numeric status panels report (`0` offline, `1` connecting, `2` online).
    /// Unknown values read as offline.
    pub fn from_panel_code(code: u8) -> Self {
        match code {
            1 => Self::Connecting,
            2 => Self::Online,
            _ => Self::Offline,
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = InternalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "offline" => Ok(Self::Offline),
            "connecting" => Ok(Self::Connecting),
            "online" => Ok(Self::Online),
            other => Err(InternalError::InvalidStoredValue {
                column: "connection_status",
                value: other.to_string(),
            }),
        }
    }
}

/// A bot of any family.
#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    pub id: i32,
    pub family: BotFamily,
    /// Unique per family; addresses the bot on its remote panel.
    pub template_name: String,
    pub owner_username: String,
    /// `None` for rank systems, which live on the singleton panel.
    pub panel_id: Option<i32>,
    pub package_id: Option<i32>,
    pub lifecycle_state: LifecycleState,
    pub connection_status: ConnectionStatus,
    /// `None` for unlimited bots.
    pub expires_at: Option<DateTime<Utc>>,
    pub autorenew: bool,
    pub billing: BillingSnapshot,
    /// Family specific configuration sent to the panel on (re)creation.
    pub template: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Bot {
    /// Converts an entity model to a bot domain model at the repository boundary.
    ///
    /// # Returns
    /// - `Ok(Bot)` - The converted bot
    /// - `Err(DbErr::Custom)` - An enum column or JSON document could not be parsed
    pub fn from_entity(entity: entity::bot::Model) -> Result<Self, DbErr> {
        let template =
            serde_json::from_str(&entity.template).map_err(|source| InternalError::InvalidJson {
                column: "template",
                source,
            })?;

        Ok(Self {
            id: entity.id,
            family: entity.family.parse()?,
            lifecycle_state: entity.lifecycle_state.parse()?,
            connection_status: entity.connection_status.parse()?,
            billing: BillingSnapshot::parse(&entity.billing_snapshot)?,
            template,
            template_name: entity.template_name,
            owner_username: entity.owner_username,
            panel_id: entity.panel_id,
            package_id: entity.package_id,
            expires_at: entity.expires_at,
            autorenew: entity.autorenew,
            created_at: entity.created_at,
        })
    }

    pub fn is_suspended(&self) -> bool {
        self.lifecycle_state == LifecycleState::Suspended
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Payload that recreates this bot on its panel.
    pub fn remote_template(&self) -> BotTemplate {
        BotTemplate {
            template_name: self.template_name.clone(),
            config: self.template.clone(),
            permissions: self
                .billing
                .permissions
                .iter()
                .map(|(key, grant)| (key.clone(), grant.quantity))
                .collect(),
        }
    }
}

/// Everything a panel needs to create a bot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotTemplate {
    pub template_name: String,
    pub config: serde_json::Value,
    pub permissions: BTreeMap<String, u32>,
}

/// A bot as reported by its panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBot {
    pub template_name: String,
    pub status: ConnectionStatus,
}

/// Parameters for creating a bot.
#[derive(Debug, Clone)]
pub struct CreateBotParams {
    /// Account to create the bot for; only admins may name someone other than
    /// themselves. `None` creates it for the requester.
    pub owner_username: Option<String>,
    pub template_name: String,
    pub package_id: i32,
    /// Admin-chosen panel; `None` places the bot on the first panel with capacity.
    pub panel_id: Option<i32>,
    /// Permission key to quantity. Manager bots only.
    pub permissions: BTreeMap<String, u32>,
    pub template: serde_json::Value,
    pub autorenew: bool,
}

/// Row values for a new bot, assembled by the lifecycle service.
#[derive(Debug, Clone)]
pub struct NewBotRecord {
    pub family: BotFamily,
    pub template_name: String,
    pub owner_username: String,
    pub panel_id: Option<i32>,
    pub package_id: Option<i32>,
    pub connection_status: ConnectionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub autorenew: bool,
    pub billing: BillingSnapshot,
    pub template: serde_json::Value,
}

/// Bot changes; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct EditBotParams {
    pub template: Option<serde_json::Value>,
    /// Full replacement permission set. Manager bots only.
    pub permissions: Option<BTreeMap<String, u32>>,
}
