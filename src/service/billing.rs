//! Balance ledger and proration math.
//!
//! Every balance change is a read-modify-write under an exclusive row lock, finished
//! with a compare-and-set write. Run it on a `DatabaseTransaction` so the lock spans
//! the read and the write and so the change commits or rolls back together with the
//! rest of the operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use tracing::debug;

use crate::{
    data::user::UserRepository,
    error::billing::LedgerError,
    model::billing::{BillingSnapshot, PermissionGrant, PERMISSION_PRICE_DAYS},
};

/// Compare-and-set attempts before giving up on a contended balance.
const MAX_ATTEMPTS: usize = 5;

pub struct BillingLedger<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> BillingLedger<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Subtracts `amount` from the user's balance.
    ///
    /// # Returns
    /// - `Ok(balance)` - The new balance
    /// - `Err(LedgerError::InsufficientBalance)` - Balance does not cover `amount`;
    ///   nothing was written
    /// - `Err(LedgerError::AccountNotFound)` - No such user
    pub async fn debit(&self, username: &str, amount: i64) -> Result<i64, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply(username, -amount).await
    }

    /// Adds `amount` to the user's balance.
    pub async fn credit(&self, username: &str, amount: i64) -> Result<i64, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply(username, amount).await
    }

    async fn apply(&self, username: &str, delta: i64) -> Result<i64, LedgerError> {
        let users = UserRepository::new(self.db);

        for attempt in 1..=MAX_ATTEMPTS {
            let user = users
                .find_for_update(username)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(username.to_string()))?;

            let balance = user.balance + delta;
            if balance < 0 {
                return Err(LedgerError::InsufficientBalance {
                    required: -delta,
                    available: user.balance,
                });
            }
            if delta == 0 {
                return Ok(user.balance);
            }

            if users
                .compare_and_set_balance(username, user.balance, balance)
                .await?
            {
                debug!(username, delta, balance, "balance updated");
                return Ok(balance);
            }
            debug!(username, attempt, "balance changed concurrently, retrying");
        }

        Err(LedgerError::Contended(username.to_string()))
    }
}

/// Whole days until `expires_at`, zero once expired.
pub fn whole_days_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_days().max(0)
}

/// Days a refund pays back: whole days left minus the current, partially used day.
pub fn refundable_days(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (whole_days_left(expires_at, now) - 1).max(0)
}

/// Credit for the unused part of a billing cycle.
///
/// `cycle_price * refundable_days / days`, rounded down. Unlimited bots and bots without
/// an expiry get nothing back.
pub fn refund_amount(
    snapshot: &BillingSnapshot,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let (Some(days), Some(expires_at)) = (snapshot.days, expires_at) else {
        return 0;
    };
    if days <= 0 {
        return 0;
    }

    snapshot.cycle_price() * refundable_days(expires_at, now) / i64::from(days)
}

/// Days a permission change is charged for: whole days left, or one month for bots
/// without an expiry.
pub fn chargeable_days(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match expires_at {
        Some(expires_at) => whole_days_left(expires_at, now),
        None => PERMISSION_PRICE_DAYS,
    }
}

/// `unit_price * quantity / 30 * days`, rounded down.
pub fn permission_charge(unit_price: i64, quantity: u32, days: i64) -> i64 {
    unit_price * i64::from(quantity) * days / PERMISSION_PRICE_DAYS
}

/// Charge for moving from the `current` permission grants to `next`.
///
/// Newly enabled permissions are charged in full for `days`; a raised quantity is
/// charged only for the added units. Removed or reduced permissions are not refunded.
pub fn permission_change_charge(
    current: &BTreeMap<String, PermissionGrant>,
    next: &BTreeMap<String, PermissionGrant>,
    days: i64,
) -> i64 {
    next.iter()
        .map(|(key, grant)| {
            let held = current.get(key).map(|g| g.quantity).unwrap_or(0);
            let added = grant.quantity.saturating_sub(held);
            permission_charge(grant.unit_price, added, days)
        })
        .sum()
}
