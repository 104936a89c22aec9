use std::fmt;

use thiserror::Error;

/// Machine readable failure code of a remote panel call.
///
/// Both remote flavours (socket RPC and audio HTTP) are normalised to this one set so
/// callers handle a single error shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelErrorCode {
    /// The panel does not know the addressed bot.
    NotFound,
    /// The bot is already connected.
    AlreadyConnected,
    /// The bot is already disconnected.
    NotConnected,
    /// A bot with this template name already exists on the panel.
    AlreadyAdded,
    /// The panel failed to connect the bot to its target server.
    ConnectFailed,
    /// The panel could not be reached at all.
    Unreachable,
    /// The panel did not acknowledge within the per-call timeout.
    Timeout,
    /// A singleton panel was used before it was initialized.
    NotInitialized,
    /// Any other code the panel reported.
    Other(String),
}

impl PanelErrorCode {
    /// Maps a wire error code to its variant.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "NOT_FOUND" => Self::NotFound,
            "ALREADY_CONNECTED" => Self::AlreadyConnected,
            "NOT_CONNECTED" | "ALREADY_DISCONNECTED" => Self::NotConnected,
            "ALREADY_ADDED" => Self::AlreadyAdded,
            "CONNECT_FAILED" => Self::ConnectFailed,
            "ECONNREFUSED" | "SOCKET_NOT_CONNECTED" | "PANEL_UNREACHABLE" => Self::Unreachable,
            "TIMEOUT" => Self::Timeout,
            "PANEL_NOT_INITIALIZED" => Self::NotInitialized,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyConnected => "ALREADY_CONNECTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::AlreadyAdded => "ALREADY_ADDED",
            Self::ConnectFailed => "CONNECT_FAILED",
            Self::Unreachable => "PANEL_UNREACHABLE",
            Self::Timeout => "TIMEOUT",
            Self::NotInitialized => "PANEL_NOT_INITIALIZED",
            Self::Other(code) => code,
        }
    }

    /// Whether the failure means the panel itself is not reachable, as opposed to the
    /// panel rejecting the request.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable | Self::Timeout | Self::NotInitialized)
    }
}

impl fmt::Display for PanelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a remote panel call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {detail}")]
pub struct PanelError {
    pub code: PanelErrorCode,
    pub detail: String,
}

impl PanelError {
    pub fn new(code: PanelErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(PanelErrorCode::Unreachable, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(PanelErrorCode::Timeout, detail)
    }

    /// Builds an error from a wire code and an optional message.
    pub fn from_wire(code: &str, message: Option<String>) -> Self {
        Self::new(
            PanelErrorCode::from_wire(code),
            message.unwrap_or_else(|| code.to_string()),
        )
    }
}
