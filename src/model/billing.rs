//! Billing basis frozen onto bot and server rows.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::internal::InternalError;

/// Days a monthly permission price is amortized over.
///
/// Permission prices are monthly regardless of the package cycle length, so every
/// permission charge uses this divisor rather than the package's own day count.
pub const PERMISSION_PRICE_DAYS: i64 = 30;

/// Price basis of a bot or server captured at creation or edit time.
///
/// Renewals, extensions and refunds always read the snapshot, never the current
/// price list, so later price changes only affect new purchases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSnapshot {
    /// Package price of one cycle.
    pub amount: i64,
    /// Cycle length in days, `None` for unlimited.
    pub days: Option<i32>,
    #[serde(default)]
    pub permissions: BTreeMap<String, PermissionGrant>,
}

/// One permission enabled on a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Monthly price of one unit at the time it was granted.
    pub unit_price: i64,
    pub quantity: u32,
    /// Whether the permission is bought in quantities.
    pub multi: bool,
}

impl PermissionGrant {
    pub fn monthly_price(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}

impl BillingSnapshot {
    pub fn parse(raw: &str) -> Result<Self, InternalError> {
        serde_json::from_str(raw).map_err(|source| InternalError::InvalidJson {
            column: "billing_snapshot",
            source,
        })
    }

    pub fn to_json(&self) -> Result<String, InternalError> {
        serde_json::to_string(self).map_err(|source| InternalError::InvalidJson {
            column: "billing_snapshot",
            source,
        })
    }

    pub fn is_unlimited(&self) -> bool {
        self.days.is_none()
    }

    /// Length of one cycle, `None` for unlimited.
    pub fn cycle(&self) -> Option<Duration> {
        self.days.map(|days| Duration::days(i64::from(days)))
    }

    /// Sum of the monthly prices of every granted permission.
    pub fn monthly_permission_price(&self) -> i64 {
        self.permissions.values().map(PermissionGrant::monthly_price).sum()
    }

    /// Price of one full cycle: the package amount plus permissions amortized over the
    /// cycle length. Unlimited snapshots pay permissions as one month.
    pub fn cycle_price(&self) -> i64 {
        let days = self
            .days
            .map(i64::from)
            .unwrap_or(PERMISSION_PRICE_DAYS);
        self.amount + self.monthly_permission_price() * days / PERMISSION_PRICE_DAYS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(unit_price: i64, quantity: u32, multi: bool) -> PermissionGrant {
        PermissionGrant {
            unit_price,
            quantity,
            multi,
        }
    }

    #[test]
    fn cycle_price_amortizes_permissions_over_cycle_length() {
        let snapshot = BillingSnapshot {
            amount: 3000,
            days: Some(60),
            permissions: BTreeMap::from([
                ("music".to_string(), grant(300, 1, false)),
                ("channels".to_string(), grant(100, 3, true)),
            ]),
        };

        // 3000 + (300 + 300) * 60 / 30
        assert_eq!(snapshot.cycle_price(), 4200);
    }

    #[test]
    fn parses_snapshot_without_permissions() {
        let snapshot = BillingSnapshot::parse(r#"{"amount":3000,"days":null}"#).unwrap();

        assert!(snapshot.is_unlimited());
        assert!(snapshot.permissions.is_empty());
        assert_eq!(snapshot.cycle_price(), 3000);
    }

    #[test]
    fn rejects_malformed_snapshot() {
        assert!(BillingSnapshot::parse("not json").is_err());
    }
}
