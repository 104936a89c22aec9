use sea_orm::DbErr;
use thiserror::Error;

/// Internal issues with the codebase indicating unexpected behavior & possible bugs
#[derive(Error, Debug)]
pub enum InternalError {
    /// A stored enum-like column holds a value no variant maps to.
    ///
    /// Occurs when a row was written by something other than this crate or a variant
    /// was removed without migrating existing rows.
    #[error("Invalid value '{value}' stored in column {column}")]
    InvalidStoredValue {
        /// Column the value was read from
        column: &'static str,
        /// The unrecognised value
        value: String,
    },

    /// A stored JSON document (billing snapshot or template) failed to parse.
    #[error("Failed to parse stored {column} JSON: {source}")]
    InvalidJson {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A billing amount was negative where only non-negative amounts make sense.
    #[error("Invalid billing amount {0}")]
    InvalidAmount(i64),

    /// A balance changed underneath every compare-and-set attempt.
    #[error("Balance of {0} kept changing during update")]
    BalanceContended(String),
}

/// Lets model conversions at the repository boundary keep returning `DbErr`.
impl From<InternalError> for DbErr {
    fn from(err: InternalError) -> Self {
        DbErr::Custom(err.to_string())
    }
}
