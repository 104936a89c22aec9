use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;

use crate::error::{
    billing::LedgerError,
    internal::InternalError,
    panel::{PanelError, PanelErrorCode},
};

/// Typed failure of a lifecycle operation.
///
/// The route layer maps `code()` to its own status codes; the `Display` string is the
/// human readable message.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The resource does not exist or is not actionable (suspended bots are invisible
    /// to connect-style operations).
    #[error("{0} not found")]
    NotFound(String),

    /// The requester may not act on this resource.
    #[error("You do not have access to this resource")]
    Forbidden,

    /// The bot's panel is missing or marked offline.
    #[error("Panel {0} is offline")]
    PanelOffline(String),

    /// The remote panel could not be reached for this call.
    #[error("Panel unreachable: {0}")]
    PanelUnreachable(String),

    /// No online panel with free capacity exists for the family.
    #[error("No available panel")]
    NoAvailablePanel,

    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: i64, available: i64 },

    /// The resource expired and must be extended before it can be activated.
    #[error("Expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("Template name '{0}' is already in use")]
    DuplicateTemplateName(String),

    #[error("{0}")]
    BadRequest(String),

    /// The panel rejected the call with a code that has no known recovery.
    #[error("Remote operation failed: {0}")]
    RemoteOperation(PanelError),

    #[error(transparent)]
    Internal(#[from] InternalError),

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl LifecycleError {
    /// Stable machine readable failure code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::PanelOffline(_) => "PANEL_OFFLINE",
            Self::PanelUnreachable(_) => "PANEL_UNREACHABLE",
            Self::NoAvailablePanel => "NO_AVAILABLE_PANEL",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Expired(_) => "EXPIRED",
            Self::DuplicateTemplateName(_) => "TEMPLATE_NAME_IN_USE",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::RemoteOperation(_) => "REMOTE_ERROR",
            Self::Internal(_) | Self::Db(_) => "INTERNAL",
        }
    }
}

impl From<PanelError> for LifecycleError {
    fn from(err: PanelError) -> Self {
        if err.code.is_unreachable() {
            Self::PanelUnreachable(err.detail)
        } else if err.code == PanelErrorCode::NotFound {
            Self::NotFound(format!("Remote bot ({})", err.detail))
        } else {
            Self::RemoteOperation(err)
        }
    }
}

impl From<LedgerError> for LifecycleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                required,
                available,
            } => Self::InsufficientBalance {
                required,
                available,
            },
            LedgerError::AccountNotFound(username) => Self::NotFound(format!("User {}", username)),
            LedgerError::InvalidAmount(amount) => {
                Self::Internal(InternalError::InvalidAmount(amount))
            }
            LedgerError::Contended(username) => {
                Self::Internal(InternalError::BalanceContended(username))
            }
            LedgerError::Db(err) => Self::Db(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_panel_errors_keep_their_own_code() {
        let err: LifecycleError = PanelError::unreachable("ws://panel").into();
        assert_eq!(err.code(), "PANEL_UNREACHABLE");

        let err: LifecycleError = PanelError::timeout("createBot").into();
        assert_eq!(err.code(), "PANEL_UNREACHABLE");
    }

    #[test]
    fn unknown_remote_codes_become_remote_errors() {
        let err: LifecycleError = PanelError::from_wire("CONNECT_FAILED", None).into();

        assert_eq!(err.code(), "REMOTE_ERROR");
    }

    #[test]
    fn ledger_shortfall_keeps_amounts() {
        let err: LifecycleError = LedgerError::InsufficientBalance {
            required: 500,
            available: 20,
        }
        .into();

        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
        assert!(err.to_string().contains("500"));
    }
}
