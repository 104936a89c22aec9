//! Package factory for creating price list rows.

use crate::factory::helpers::next_id;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test packages.
pub struct PackageFactory<'a> {
    db: &'a DatabaseConnection,
    family: String,
    name: String,
    amount: i64,
    days: Option<i32>,
}

impl<'a> PackageFactory<'a> {
    /// Creates a new PackageFactory with default values.
    ///
    /// Defaults:
    /// - name: `"Package {id}"`
    /// - amount: `3000`
    /// - days: `Some(30)`
    pub fn new(db: &'a DatabaseConnection, family: impl Into<String>) -> Self {
        let id = next_id();
        Self {
            db,
            family: family.into(),
            name: format!("Package {}", id),
            amount: 3000,
            days: Some(30),
        }
    }

    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the cycle length, `None` for an unlimited package.
    pub fn days(mut self, days: Option<i32>) -> Self {
        self.days = days;
        self
    }

    /// Builds and inserts the package entity into the database.
    pub async fn build(self) -> Result<entity::package::Model, DbErr> {
        entity::package::ActiveModel {
            id: ActiveValue::NotSet,
            family: ActiveValue::Set(self.family),
            name: ActiveValue::Set(self.name),
            amount: ActiveValue::Set(self.amount),
            days: ActiveValue::Set(self.days),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a 30 day package priced at 3000 for `family`.
pub async fn create_package(
    db: &DatabaseConnection,
    family: &str,
) -> Result<entity::package::Model, DbErr> {
    PackageFactory::new(db, family).build().await
}
