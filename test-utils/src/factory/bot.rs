//! Bot factory for creating bot rows of any family.

use crate::factory::helpers::{expires_in_days, next_id, package_snapshot};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test bots with customizable fields.
///
/// # Example
///
/// ```rust,ignore
/// let bot = BotFactory::new(&db, &user.username, "manager_bot")
///     .panel_id(Some(panel.id))
///     .connection_status("online")
///     .build()
///     .await?;
/// ```
pub struct BotFactory<'a> {
    db: &'a DatabaseConnection,
    family: String,
    template_name: String,
    owner_username: String,
    panel_id: Option<i32>,
    package_id: Option<i32>,
    lifecycle_state: String,
    connection_status: String,
    expires_at: Option<DateTime<Utc>>,
    autorenew: bool,
    billing_snapshot: serde_json::Value,
    template: serde_json::Value,
}

impl<'a> BotFactory<'a> {
    /// Creates a new BotFactory with default values.
    ///
    /// Defaults:
    /// - template_name: `"bot_{id}"`
    /// - panel_id / package_id: `None`
    /// - lifecycle_state: `"active"`, connection_status: `"offline"`
    /// - expires_at: 30 days from now
    /// - billing_snapshot: 3000 per 30 days, no permissions
    /// - template: `{"nickname": "bot_{id}"}`
    pub fn new(
        db: &'a DatabaseConnection,
        owner_username: impl Into<String>,
        family: impl Into<String>,
    ) -> Self {
        let id = next_id();
        let template_name = format!("bot_{}", id);
        Self {
            db,
            family: family.into(),
            template: serde_json::json!({ "nickname": template_name }),
            template_name,
            owner_username: owner_username.into(),
            panel_id: None,
            package_id: None,
            lifecycle_state: "active".to_string(),
            connection_status: "offline".to_string(),
            expires_at: Some(expires_in_days(30)),
            autorenew: false,
            billing_snapshot: package_snapshot(3000, Some(30)),
        }
    }

    pub fn template_name(mut self, template_name: impl Into<String>) -> Self {
        self.template_name = template_name.into();
        self
    }

    pub fn panel_id(mut self, panel_id: Option<i32>) -> Self {
        self.panel_id = panel_id;
        self
    }

    pub fn package_id(mut self, package_id: Option<i32>) -> Self {
        self.package_id = package_id;
        self
    }

    pub fn lifecycle_state(mut self, state: impl Into<String>) -> Self {
        self.lifecycle_state = state.into();
        self
    }

    pub fn connection_status(mut self, status: impl Into<String>) -> Self {
        self.connection_status = status.into();
        self
    }

    /// Sets the expiry, `None` for an unlimited bot.
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

    pub fn template(mut self, template: serde_json::Value) -> Self {
        self.template = template;
        self
    }

    /// Builds and inserts the bot entity into the database.
    pub async fn build(self) -> Result<entity::bot::Model, DbErr> {
        entity::bot::ActiveModel {
            id: ActiveValue::NotSet,
            family: ActiveValue::Set(self.family),
            template_name: ActiveValue::Set(self.template_name),
            owner_username: ActiveValue::Set(self.owner_username),
            panel_id: ActiveValue::Set(self.panel_id),
            package_id: ActiveValue::Set(self.package_id),
            lifecycle_state: ActiveValue::Set(self.lifecycle_state),
            connection_status: ActiveValue::Set(self.connection_status),
            expires_at: ActiveValue::Set(self.expires_at),
            autorenew: ActiveValue::Set(self.autorenew),
            billing_snapshot: ActiveValue::Set(self.billing_snapshot.to_string()),
            template: ActiveValue::Set(self.template.to_string()),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a bot of `family` owned by `owner_username` on `panel_id`.
pub async fn create_bot(
    db: &DatabaseConnection,
    owner_username: &str,
    family: &str,
    panel_id: Option<i32>,
) -> Result<entity::bot::Model, DbErr> {
    BotFactory::new(db, owner_username, family)
        .panel_id(panel_id)
        .build()
        .await
}
