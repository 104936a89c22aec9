use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is not set.
    ///
    /// Check the `.env.example` file for required configuration variables.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable is set but could not be parsed.
    #[error("Invalid value '{value}' for environment variable {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// Only one variable of a pair that must be set together was provided.
    #[error("{set} is set but {missing} is not; set both or neither")]
    IncompletePair { set: String, missing: String },
}
