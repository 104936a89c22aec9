//! Bot data repository.
//!
//! Status writers always write the full observed value rather than a delta, so
//! overlapping reconciliation runs converge on the last observation.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use tracing::warn;

use crate::model::{
    billing::BillingSnapshot,
    bot::{Bot, BotFamily, ConnectionStatus, LifecycleState, NewBotRecord},
};

pub struct BotRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> BotRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Inserts a new active bot row.
    ///
    /// # Arguments
    /// - `record`: Row values assembled by the lifecycle service
    ///
    /// # Returns
    /// - `Ok(Bot)`: The created bot
    /// - `Err(DbErr)`: Database error, including a duplicate `(family, template_name)`
    pub async fn create(&self, record: NewBotRecord) -> Result<Bot, DbErr> {
        let entity = entity::bot::ActiveModel {
            family: ActiveValue::Set(record.family.as_str().to_string()),
            template_name: ActiveValue::Set(record.template_name),
            owner_username: ActiveValue::Set(record.owner_username),
            panel_id: ActiveValue::Set(record.panel_id),
            package_id: ActiveValue::Set(record.package_id),
            lifecycle_state: ActiveValue::Set(LifecycleState::Active.as_str().to_string()),
            connection_status: ActiveValue::Set(record.connection_status.as_str().to_string()),
            expires_at: ActiveValue::Set(record.expires_at),
            autorenew: ActiveValue::Set(record.autorenew),
            billing_snapshot: ActiveValue::Set(record.billing.to_json()?),
            template: ActiveValue::Set(record.template.to_string()),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        Bot::from_entity(entity)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Bot>, DbErr> {
        entity::prelude::Bot::find_by_id(id)
            .one(self.db)
            .await?
            .map(Bot::from_entity)
            .transpose()
    }

    /// Gets the bots of a family, optionally only those of one owner, oldest first.
    pub async fn get_by_family(
        &self,
        family: BotFamily,
        owner_username: Option<&str>,
    ) -> Result<Vec<Bot>, DbErr> {
        let mut query =
            entity::prelude::Bot::find().filter(entity::bot::Column::Family.eq(family.as_str()));
        if let Some(owner) = owner_username {
            query = query.filter(entity::bot::Column::OwnerUsername.eq(owner));
        }

        query
            .order_by_asc(entity::bot::Column::Id)
            .all(self.db)
            .await
            .map(loadable)
    }

    /// Gets every bot assigned to a panel.
    pub async fn get_by_panel(&self, panel_id: i32) -> Result<Vec<Bot>, DbErr> {
        entity::prelude::Bot::find()
            .filter(entity::bot::Column::PanelId.eq(panel_id))
            .order_by_asc(entity::bot::Column::Id)
            .all(self.db)
            .await
            .map(loadable)
    }

    /// Whether a bot of `family` already uses `template_name`.
    pub async fn template_name_exists(
        &self,
        family: BotFamily,
        template_name: &str,
    ) -> Result<bool, DbErr> {
        let count = entity::prelude::Bot::find()
            .filter(entity::bot::Column::Family.eq(family.as_str()))
            .filter(entity::bot::Column::TemplateName.eq(template_name))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    /// Gets active bots whose expiry lies before `now`.
    pub async fn get_expired(&self, now: DateTime<Utc>) -> Result<Vec<Bot>, DbErr> {
        entity::prelude::Bot::find()
            .filter(entity::bot::Column::ExpiresAt.lt(now))
            .filter(entity::bot::Column::LifecycleState.eq(LifecycleState::Active.as_str()))
            .order_by_asc(entity::bot::Column::Id)
            .all(self.db)
            .await
            .map(loadable)
    }

    pub async fn set_connection_status(
        &self,
        id: i32,
        status: ConnectionStatus,
    ) -> Result<(), DbErr> {
        self.set_connection_status_for_ids(&[id], status)
            .await
            .map(|_| ())
    }

    /// Overwrites the connection status of several bots at once.
    ///
    /// # Returns
    /// - `Ok(u64)`: Number of rows written
    /// - `Err(DbErr)`: Database error
    pub async fn set_connection_status_for_ids(
        &self,
        ids: &[i32],
        status: ConnectionStatus,
    ) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = entity::prelude::Bot::update_many()
            .col_expr(
                entity::bot::Column::ConnectionStatus,
                Expr::value(status.as_str()),
            )
            .filter(entity::bot::Column::Id.is_in(ids.iter().copied()))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Marks every bot on a panel offline.
    ///
    /// # Returns
    /// - `Ok(u64)`: Number of rows written
    pub async fn set_offline_for_panel(&self, panel_id: i32) -> Result<u64, DbErr> {
        let result = entity::prelude::Bot::update_many()
            .col_expr(
                entity::bot::Column::ConnectionStatus,
                Expr::value(ConnectionStatus::Offline.as_str()),
            )
            .filter(entity::bot::Column::PanelId.eq(panel_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Marks every bot on a panel offline and clears their panel assignment, ahead of
    /// the panel row being deleted.
    pub async fn detach_panel(&self, panel_id: i32) -> Result<u64, DbErr> {
        let result = entity::prelude::Bot::update_many()
            .col_expr(
                entity::bot::Column::ConnectionStatus,
                Expr::value(ConnectionStatus::Offline.as_str()),
            )
            .col_expr(entity::bot::Column::PanelId, Expr::value(Option::<i32>::None))
            .filter(entity::bot::Column::PanelId.eq(panel_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Marks every bot of a family offline. Used for the singleton rank panel, whose bots
    /// carry no panel id.
    pub async fn set_offline_for_family(&self, family: BotFamily) -> Result<u64, DbErr> {
        let result = entity::prelude::Bot::update_many()
            .col_expr(
                entity::bot::Column::ConnectionStatus,
                Expr::value(ConnectionStatus::Offline.as_str()),
            )
            .filter(entity::bot::Column::Family.eq(family.as_str()))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Writes both state axes together.
    pub async fn set_state(
        &self,
        id: i32,
        lifecycle: LifecycleState,
        status: ConnectionStatus,
    ) -> Result<(), DbErr> {
        entity::prelude::Bot::update_many()
            .col_expr(
                entity::bot::Column::LifecycleState,
                Expr::value(lifecycle.as_str()),
            )
            .col_expr(
                entity::bot::Column::ConnectionStatus,
                Expr::value(status.as_str()),
            )
            .filter(entity::bot::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Replaces the stored template and billing snapshot.
    pub async fn update_configuration(
        &self,
        id: i32,
        template: &serde_json::Value,
        billing: &BillingSnapshot,
    ) -> Result<(), DbErr> {
        entity::prelude::Bot::update_many()
            .col_expr(entity::bot::Column::Template, Expr::value(template.to_string()))
            .col_expr(
                entity::bot::Column::BillingSnapshot,
                Expr::value(billing.to_json()?),
            )
            .filter(entity::bot::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    pub async fn set_expiry(
        &self,
        id: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbErr> {
        entity::prelude::Bot::update_many()
            .col_expr(entity::bot::Column::ExpiresAt, Expr::value(expires_at))
            .filter(entity::bot::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    pub async fn set_autorenew(&self, id: i32, autorenew: bool) -> Result<(), DbErr> {
        entity::prelude::Bot::update_many()
            .col_expr(entity::bot::Column::Autorenew, Expr::value(autorenew))
            .filter(entity::bot::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Deletes a bot row.
    ///
    /// # Returns
    /// - `Ok(true)`: Bot deleted
    /// - `Ok(false)`: No bot with this id
    pub async fn delete(&self, id: i32) -> Result<bool, DbErr> {
        let result = entity::prelude::Bot::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }
}

/// Converts rows read by batch queries, skipping and logging the ones that fail.
fn loadable(rows: Vec<entity::bot::Model>) -> Vec<Bot> {
    rows.into_iter()
        .filter_map(|row| {
            let bot_id = row.id;
            Bot::from_entity(row)
                .map_err(|err| warn!(bot_id, error = %err, "skipping bot row that failed to load"))
                .ok()
        })
        .collect()
}
