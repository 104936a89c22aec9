use crate::model::{billing::BillingSnapshot, bot::BotFamily};
use sea_orm::DbErr;

/// Price list row for one bot family.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub id: i32,
    pub family: BotFamily,
    pub name: String,
    pub amount: i64,
    /// Cycle length in days, `None` for unlimited.
    pub days: Option<i32>,
}

impl Package {
    pub fn from_entity(entity: entity::package::Model) -> Result<Self, DbErr> {
        Ok(Self {
            id: entity.id,
            family: entity.family.parse()?,
            name: entity.name,
            amount: entity.amount,
            days: entity.days,
        })
    }

    /// Snapshot with this package's price and no permissions.
    pub fn snapshot(&self) -> BillingSnapshot {
        BillingSnapshot {
            amount: self.amount,
            days: self.days,
            permissions: Default::default(),
        }
    }
}

/// Monthly price of one permission unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionPrice {
    pub key: String,
    pub name: String,
    pub price: i64,
    pub multi_valued: bool,
}

impl PermissionPrice {
    pub fn from_entity(entity: entity::permission_price::Model) -> Self {
        Self {
            key: entity.key,
            name: entity.name,
            price: entity.price,
            multi_valued: entity.multi_valued,
        }
    }
}
