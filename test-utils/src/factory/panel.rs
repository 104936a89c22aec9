//! Panel factory for creating remote panel rows.

use crate::factory::helpers::next_id;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test panels.
///
/// Panels default to `online` with spare capacity so they are eligible for automatic
/// placement.
pub struct PanelFactory<'a> {
    db: &'a DatabaseConnection,
    family: String,
    name: String,
    host: String,
    token: String,
    max_bot_capacity: i32,
    current_bot_count: i32,
    status: String,
}

impl<'a> PanelFactory<'a> {
    /// Creates a new PanelFactory with default values.
    ///
    /// Defaults:
    /// - name: `"Panel {id}"`
    /// - host: `"ws://127.0.0.1:1/{id}"`
    /// - max_bot_capacity: `10`, current_bot_count: `0`
    /// - status: `"online"`
    pub fn new(db: &'a DatabaseConnection, family: impl Into<String>) -> Self {
        let id = next_id();
        Self {
            db,
            family: family.into(),
            name: format!("Panel {}", id),
            host: format!("ws://127.0.0.1:1/{}", id),
            token: format!("token-{}", id),
            max_bot_capacity: 10,
            current_bot_count: 0,
            status: "online".to_string(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn max_bot_capacity(mut self, capacity: i32) -> Self {
        self.max_bot_capacity = capacity;
        self
    }

    pub fn current_bot_count(mut self, count: i32) -> Self {
        self.current_bot_count = count;
        self
    }

    /// Sets the status string, `"online"` or `"offline"`.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Builds and inserts the panel entity into the database.
    pub async fn build(self) -> Result<entity::panel::Model, DbErr> {
        entity::panel::ActiveModel {
            id: ActiveValue::NotSet,
            family: ActiveValue::Set(self.family),
            name: ActiveValue::Set(self.name),
            host: ActiveValue::Set(self.host),
            token: ActiveValue::Set(self.token),
            max_bot_capacity: ActiveValue::Set(self.max_bot_capacity),
            current_bot_count: ActiveValue::Set(self.current_bot_count),
            status: ActiveValue::Set(self.status),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(self.db)
        .await
    }
}

/// Creates an online panel of `family` with default values.
pub async fn create_panel(
    db: &DatabaseConnection,
    family: &str,
) -> Result<entity::panel::Model, DbErr> {
    PanelFactory::new(db, family).build().await
}
