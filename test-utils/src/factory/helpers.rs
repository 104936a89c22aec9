//! Shared helper utilities for factory methods.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::json;

/// Counter for generating unique IDs in tests.
static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// Gets the next unique counter value for test data.
///
/// # Returns
/// - `u64` - Next unique counter value
pub fn next_id() -> u64 {
    COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}

/// Billing snapshot JSON for a plain package with no permissions.
///
/// # Arguments
/// - `amount` - Price of one billing cycle
/// - `days` - Cycle length in days, `None` for unlimited
pub fn package_snapshot(amount: i64, days: Option<i32>) -> serde_json::Value {
    json!({ "amount": amount, "days": days, "permissions": {} })
}

/// Expiry timestamp `days` whole days from now, with an hour of headroom so tests that
/// compute remaining whole days are not sensitive to how long the test itself runs.
pub fn expires_in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days) + Duration::hours(1)
}

/// Creates an online panel of `family` and a bot on it owned by a fresh user.
///
/// # Arguments
/// - `db` - Database connection
/// - `family` - Bot family string stored on both rows
///
/// # Returns
/// - `Ok((user, panel, bot))` - Created rows
/// - `Err(DbErr)` - Database error during creation
pub async fn create_bot_with_dependencies(
    db: &DatabaseConnection,
    family: &str,
) -> Result<
    (
        entity::user::Model,
        entity::panel::Model,
        entity::bot::Model,
    ),
    DbErr,
> {
    let user = crate::factory::user::create_user(db).await?;
    let panel = crate::factory::panel::create_panel(db, family).await?;
    let bot = crate::factory::bot::BotFactory::new(db, &user.username, family)
        .panel_id(Some(panel.id))
        .build()
        .await?;

    Ok((user, panel, bot))
}
