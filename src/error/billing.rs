use sea_orm::DbErr;
use thiserror::Error;

/// Balance ledger failures.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The account balance does not cover the debit.
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: i64, available: i64 },

    /// No account with this username exists.
    #[error("Account {0} not found")]
    AccountNotFound(String),

    /// Debits and credits only accept non-negative amounts.
    #[error("Invalid amount {0}")]
    InvalidAmount(i64),

    /// The balance kept changing between read and write.
    #[error("Balance of {0} is contended, try again")]
    Contended(String),

    #[error(transparent)]
    Db(#[from] DbErr),
}
