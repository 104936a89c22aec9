//! User data repository.
//!
//! Balance changes go through `find_for_update` plus `compare_and_set_balance` so a
//! read-modify-write can never apply against a balance that changed underneath it.

use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
};

use crate::model::user::User;

pub struct UserRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Finds a user by username.
    ///
    /// # Returns
    /// - `Ok(Some(User))` - User found
    /// - `Ok(None)` - No such user
    /// - `Err(DbErr)` - Database error or unparsable row
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbErr> {
        entity::prelude::User::find_by_id(username.to_string())
            .one(self.db)
            .await?
            .map(User::from_entity)
            .transpose()
    }

    /// Reads a user while taking an exclusive row lock (`SELECT ... FOR UPDATE`).
    ///
    /// The lock is held until the enclosing transaction ends, so this must be called on
    /// a `DatabaseTransaction`. Backends without row locks (SQLite) lock the whole
    /// database for writes instead; `compare_and_set_balance` keeps the update correct
    /// either way.
    pub async fn find_for_update(&self, username: &str) -> Result<Option<User>, DbErr> {
        entity::prelude::User::find_by_id(username.to_string())
            .lock_exclusive()
            .one(self.db)
            .await?
            .map(User::from_entity)
            .transpose()
    }

    /// Writes `new_balance` only if the stored balance still equals `expected`.
    ///
    /// # Returns
    /// - `Ok(true)` - Balance updated
    /// - `Ok(false)` - Balance changed since it was read (or user vanished), nothing written
    /// - `Err(DbErr)` - Database error
    pub async fn compare_and_set_balance(
        &self,
        username: &str,
        expected: i64,
        new_balance: i64,
    ) -> Result<bool, DbErr> {
        let result = entity::prelude::User::update_many()
            .col_expr(entity::user::Column::Balance, Expr::value(new_balance))
            .filter(entity::user::Column::Username.eq(username))
            .filter(entity::user::Column::Balance.eq(expected))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}
