//! Account models and the identity lifecycle operations are performed for.

use std::{fmt, str::FromStr};

use sea_orm::DbErr;

use crate::error::internal::InternalError;

/// Account scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// May act on every resource.
    Admin,
    /// May only act on resources they own.
    Reseller,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Reseller => "reseller",
        }
    }
}

impl FromStr for Scope {
    type Err = InternalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "reseller" => Ok(Self::Reseller),
            other => Err(InternalError::InvalidStoredValue {
                column: "user.scope",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account with a non-negative balance.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub balance: i64,
    pub scope: Scope,
}

impl User {
    /// Converts an entity model to a user domain model at the repository boundary.
    ///
    /// # Returns
    /// - `Ok(User)` - The converted user domain model
    /// - `Err(DbErr::Custom)` - Stored scope is not a known scope
    pub fn from_entity(entity: entity::user::Model) -> Result<Self, DbErr> {
        Ok(Self {
            scope: entity.scope.parse()?,
            username: entity.username,
            balance: entity.balance,
        })
    }

    pub fn requester(&self) -> Requester {
        Requester::new(self.username.clone(), self.scope)
    }
}

/// Identity a lifecycle operation is invoked for.
///
/// Built by the route layer from the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub username: String,
    pub scope: Scope,
}

impl Requester {
    pub fn new(username: impl Into<String>, scope: Scope) -> Self {
        Self {
            username: username.into(),
            scope,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Scope::Admin)
    }

    pub fn reseller(username: impl Into<String>) -> Self {
        Self::new(username, Scope::Reseller)
    }

    pub fn is_admin(&self) -> bool {
        self.scope == Scope::Admin
    }

    /// Admins manage everything, resellers only what they own.
    pub fn can_manage(&self, owner_username: &str) -> bool {
        self.is_admin() || self.username == owner_username
    }
}
