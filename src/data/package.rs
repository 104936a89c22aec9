use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};

use crate::model::package::{Package, PermissionPrice};

pub struct PackageRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> PackageRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Package>, DbErr> {
        entity::prelude::Package::find_by_id(id)
            .one(self.db)
            .await?
            .map(Package::from_entity)
            .transpose()
    }
}

pub struct PermissionPriceRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> PermissionPriceRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Gets the price rows for the given permission keys.
    ///
    /// Unknown keys are simply absent from the result.
    pub async fn get_by_keys<I>(&self, keys: I) -> Result<Vec<PermissionPrice>, DbErr>
    where
        I: IntoIterator<Item = String>,
    {
        let keys: Vec<String> = keys.into_iter().collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        Ok(entity::prelude::PermissionPrice::find()
            .filter(entity::permission_price::Column::Key.is_in(keys))
            .all(self.db)
            .await?
            .into_iter()
            .map(PermissionPrice::from_entity)
            .collect())
    }
}
