use thiserror::Error;

/// TeamSpeak query collaborator failures.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The WebQuery endpoint could not be reached or timed out.
    #[error("TeamSpeak query unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The query interface answered with a non-zero status code.
    #[error("TeamSpeak query error {code}: {message}")]
    Status { code: i64, message: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected TeamSpeak query response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            QueryError::InvalidResponse(err.to_string())
        } else {
            QueryError::Unreachable(err)
        }
    }
}
