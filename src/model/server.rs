use chrono::{DateTime, Utc};
use sea_orm::DbErr;

use crate::model::{billing::BillingSnapshot, bot::LifecycleState};

/// Hosted TeamSpeak virtual server.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: i32,
    pub owner_username: String,
    pub name: String,
    pub virtual_server_id: i32,
    pub port: i32,
    /// Desired slot count; the TeamSpeak job corrects drift towards it.
    pub slots: i32,
    pub lifecycle_state: LifecycleState,
    pub expires_at: Option<DateTime<Utc>>,
    pub autorenew: bool,
    pub billing: BillingSnapshot,
}

impl Server {
    pub fn from_entity(entity: entity::server::Model) -> Result<Self, DbErr> {
        Ok(Self {
            id: entity.id,
            lifecycle_state: entity.lifecycle_state.parse()?,
            billing: BillingSnapshot::parse(&entity.billing_snapshot)?,
            owner_username: entity.owner_username,
            name: entity.name,
            virtual_server_id: entity.virtual_server_id,
            port: entity.port,
            slots: entity.slots,
            expires_at: entity.expires_at,
            autorenew: entity.autorenew,
        })
    }
}
