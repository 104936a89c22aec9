use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::warn;

use crate::model::{bot::LifecycleState, server::Server};

pub struct ServerRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ServerRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Server>, DbErr> {
        entity::prelude::Server::find_by_id(id)
            .one(self.db)
            .await?
            .map(Server::from_entity)
            .transpose()
    }

    /// Gets every active server, the set the TeamSpeak job polls.
    pub async fn get_active(&self) -> Result<Vec<Server>, DbErr> {
        entity::prelude::Server::find()
            .filter(entity::server::Column::LifecycleState.eq(LifecycleState::Active.as_str()))
            .order_by_asc(entity::server::Column::Id)
            .all(self.db)
            .await
            .map(loadable)
    }

    /// Gets active servers whose expiry lies before `now`.
    pub async fn get_expired(&self, now: DateTime<Utc>) -> Result<Vec<Server>, DbErr> {
        entity::prelude::Server::find()
            .filter(entity::server::Column::ExpiresAt.lt(now))
            .filter(entity::server::Column::LifecycleState.eq(LifecycleState::Active.as_str()))
            .order_by_asc(entity::server::Column::Id)
            .all(self.db)
            .await
            .map(loadable)
    }

    pub async fn set_lifecycle(&self, id: i32, state: LifecycleState) -> Result<(), DbErr> {
        entity::prelude::Server::update_many()
            .col_expr(
                entity::server::Column::LifecycleState,
                Expr::value(state.as_str()),
            )
            .filter(entity::server::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    pub async fn set_expiry(
        &self,
        id: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbErr> {
        entity::prelude::Server::update_many()
            .col_expr(entity::server::Column::ExpiresAt, Expr::value(expires_at))
            .filter(entity::server::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }
}

/// Converts rows read by batch queries, skipping and logging the ones that fail.
fn loadable(rows: Vec<entity::server::Model>) -> Vec<Server> {
    rows.into_iter()
        .filter_map(|row| {
            let server_id = row.id;
            Server::from_entity(row)
                .map_err(|err| warn!(server_id, error = %err, "skipping server row that failed to load"))
                .ok()
        })
        .collect()
}
