//! Panel data repository.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DbErr,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
};

use crate::model::{
    bot::BotFamily,
    panel::{CreatePanelParams, Panel, PanelStatus, UpdatePanelParams},
};

pub struct PanelRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> PanelRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Creates a panel row. New panels start offline until the first sync reaches them.
    ///
    /// # Returns
    /// - `Ok(Panel)` - The created panel
    /// - `Err(DbErr)` - Database error
    pub async fn create(&self, params: CreatePanelParams) -> Result<Panel, DbErr> {
        let entity = entity::panel::ActiveModel {
            family: ActiveValue::Set(params.family.as_str().to_string()),
            name: ActiveValue::Set(params.name),
            host: ActiveValue::Set(params.host),
            token: ActiveValue::Set(params.token),
            max_bot_capacity: ActiveValue::Set(params.max_bot_capacity),
            current_bot_count: ActiveValue::Set(0),
            status: ActiveValue::Set(PanelStatus::Offline.as_str().to_string()),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        Panel::from_entity(entity)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Panel>, DbErr> {
        entity::prelude::Panel::find_by_id(id)
            .one(self.db)
            .await?
            .map(Panel::from_entity)
            .transpose()
    }

    /// Gets every panel of a family, oldest first.
    pub async fn get_by_family(&self, family: BotFamily) -> Result<Vec<Panel>, DbErr> {
        entity::prelude::Panel::find()
            .filter(entity::panel::Column::Family.eq(family.as_str()))
            .order_by_asc(entity::panel::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Panel::from_entity)
            .collect()
    }

    /// Gets the oldest online panel of a family that still has capacity.
    ///
    /// Capacity is read from the cached `current_bot_count`, so concurrent creates may
    /// overshoot `max_bot_capacity` by a few bots until the next sync.
    pub async fn find_available(&self, family: BotFamily) -> Result<Option<Panel>, DbErr> {
        let online = entity::prelude::Panel::find()
            .filter(entity::panel::Column::Family.eq(family.as_str()))
            .filter(entity::panel::Column::Status.eq(PanelStatus::Online.as_str()))
            .order_by_asc(entity::panel::Column::Id)
            .all(self.db)
            .await?;

        for entity in online {
            let panel = Panel::from_entity(entity)?;
            if panel.has_capacity() {
                return Ok(Some(panel));
            }
        }

        Ok(None)
    }

    /// Applies the given changes to a panel.
    ///
    /// # Returns
    /// - `Ok(Some(Panel))` - The updated panel
    /// - `Ok(None)` - No panel with this id
    /// - `Err(DbErr)` - Database error
    pub async fn update(
        &self,
        id: i32,
        params: UpdatePanelParams,
    ) -> Result<Option<Panel>, DbErr> {
        let Some(entity) = entity::prelude::Panel::find_by_id(id).one(self.db).await? else {
            return Ok(None);
        };

        let mut active = entity.into_active_model();
        if let Some(name) = params.name {
            active.name = ActiveValue::Set(name);
        }
        if let Some(host) = params.host {
            active.host = ActiveValue::Set(host);
        }
        if let Some(token) = params.token {
            active.token = ActiveValue::Set(token);
        }
        if let Some(capacity) = params.max_bot_capacity {
            active.max_bot_capacity = ActiveValue::Set(capacity);
        }

        let entity = active.update(self.db).await?;
        Panel::from_entity(entity).map(Some)
    }

    /// Deletes a panel. Bots assigned to it keep their rows with `panel_id` cleared.
    ///
    /// # Returns
    /// - `Ok(true)` - Panel deleted
    /// - `Ok(false)` - No panel with this id
    pub async fn delete(&self, id: i32) -> Result<bool, DbErr> {
        let result = entity::prelude::Panel::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Records a successful sync: status online and the reported bot count.
    pub async fn mark_online(&self, id: i32, bot_count: i32) -> Result<(), DbErr> {
        entity::prelude::Panel::update_many()
            .col_expr(
                entity::panel::Column::Status,
                Expr::value(PanelStatus::Online.as_str()),
            )
            .col_expr(entity::panel::Column::CurrentBotCount, Expr::value(bot_count))
            .filter(entity::panel::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    pub async fn mark_offline(&self, id: i32) -> Result<(), DbErr> {
        entity::prelude::Panel::update_many()
            .col_expr(
                entity::panel::Column::Status,
                Expr::value(PanelStatus::Offline.as_str()),
            )
            .filter(entity::panel::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Nudges the cached bot count after a create or delete.
    ///
    /// Deliberately an unguarded read-then-write: the count is a soft capacity signal
    /// that the next sync overwrites with the panel's own number.
    pub async fn adjust_bot_count(&self, id: i32, delta: i32) -> Result<(), DbErr> {
        let Some(panel) = entity::prelude::Panel::find_by_id(id).one(self.db).await? else {
            return Ok(());
        };

        let count = (panel.current_bot_count + delta).max(0);
        entity::prelude::Panel::update_many()
            .col_expr(entity::panel::Column::CurrentBotCount, Expr::value(count))
            .filter(entity::panel::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }
}
