//! Permission price factory.

use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Creates a permission price row.
///
/// # Arguments
/// - `db` - Database connection
/// - `key` - Unique permission key, e.g. `"channel_commander"`
/// - `price` - Monthly price of one unit
/// - `multi_valued` - Whether the permission is bought in quantities
///
/// # Returns
/// - `Ok(entity::permission_price::Model)` - Created row
/// - `Err(DbErr)` - Database error during insert
pub async fn create_permission_price(
    db: &DatabaseConnection,
    key: &str,
    price: i64,
    multi_valued: bool,
) -> Result<entity::permission_price::Model, DbErr> {
    entity::permission_price::ActiveModel {
        id: ActiveValue::NotSet,
        key: ActiveValue::Set(key.to_string()),
        name: ActiveValue::Set(key.replace('_', " ")),
        price: ActiveValue::Set(price),
        multi_valued: ActiveValue::Set(multi_valued),
    }
    .insert(db)
    .await
}
