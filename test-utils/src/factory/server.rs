//! Server factory for creating TeamSpeak server rows.

use crate::factory::helpers::{expires_in_days, next_id, package_snapshot};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test servers.
pub struct ServerFactory<'a> {
    db: &'a DatabaseConnection,
    owner_username: String,
    name: String,
    virtual_server_id: i32,
    port: i32,
    slots: i32,
    lifecycle_state: String,
    expires_at: Option<DateTime<Utc>>,
    autorenew: bool,
    billing_snapshot: serde_json::Value,
}

impl<'a> ServerFactory<'a> {
    /// Creates a new ServerFactory with default values.
    ///
    /// Defaults:
    /// - virtual_server_id: `{id}`, port: `9987 + {id}`
    /// - slots: `32`
    /// - expires_at: 30 days from now, billed 3000 per 30 days
    pub fn new(db: &'a DatabaseConnection, owner_username: impl Into<String>) -> Self {
        let id = next_id() as i32;
        Self {
            db,
            owner_username: owner_username.into(),
            name: format!("Server {}", id),
            virtual_server_id: id,
            port: 9987 + id,
            slots: 32,
            lifecycle_state: "active".to_string(),
            expires_at: Some(expires_in_days(30)),
            autorenew: false,
            billing_snapshot: package_snapshot(3000, Some(30)),
        }
    }

    pub fn slots(mut self, slots: i32) -> Self {
        self.slots = slots;
        self
    }

    pub fn lifecycle_state(mut self, state: impl Into<String>) -> Self {
        self.lifecycle_state = state.into();
        self
    }

    pub fn expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn autorenew(mut self, autorenew: bool) -> Self {
        self.autorenew = autorenew;
        self
    }

    pub fn billing_snapshot(mut self, snapshot: serde_json::Value) -> Self {
        self.billing_snapshot = snapshot;
        self
    }

    /// Builds and inserts the server entity into the database.
    pub async fn build(self) -> Result<entity::server::Model, DbErr> {
        entity::server::ActiveModel {
            id: ActiveValue::NotSet,
            owner_username: ActiveValue::Set(self.owner_username),
            name: ActiveValue::Set(self.name),
            virtual_server_id: ActiveValue::Set(self.virtual_server_id),
            port: ActiveValue::Set(self.port),
            slots: ActiveValue::Set(self.slots),
            package_id: ActiveValue::Set(None),
            lifecycle_state: ActiveValue::Set(self.lifecycle_state),
            expires_at: ActiveValue::Set(self.expires_at),
            autorenew: ActiveValue::Set(self.autorenew),
            billing_snapshot: ActiveValue::Set(self.billing_snapshot.to_string()),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(self.db)
        .await
    }
}

/// Creates an active server owned by `owner_username`.
pub async fn create_server(
    db: &DatabaseConnection,
    owner_username: &str,
) -> Result<entity::server::Model, DbErr> {
    ServerFactory::new(db, owner_username).build().await
}
