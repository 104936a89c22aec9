//! Socket panel wire frames.
//!
//! Requests are `{"type":"req","id","method","params"}`. The panel answers each request
//! with exactly one `{"type":"ack","id","ok",...}` frame and pushes unsolicited
//! `{"type":"event","event","payload"}` frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::panel::PanelError,
    model::bot::{ConnectionStatus, RemoteBot},
    panel::PanelResult,
};

pub const CREATE_BOT: &str = "createBot";
pub const DELETE_BOT: &str = "deleteBot";
pub const CONNECT_BOT: &str = "connectBot";
pub const DISCONNECT_BOT: &str = "disconnectBot";
pub const RECONNECT_BOT: &str = "reconnectBot";
pub const GET_BOT_INFO: &str = "getBotInfo";
pub const GET_BOT_LIST: &str = "getBotList";

/// Event carrying one log line of a hosted bot.
pub const BOT_LOG_EVENT: &str = "bot.log";

#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub id: String,
    pub method: &'static str,
    pub params: Value,
}

impl RequestFrame {
    pub fn new(id: String, method: &'static str, params: Value) -> Self {
        Self {
            frame_type: "req",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Ack(AckFrame),
    Event(EventFrame),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AckFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AckFrame {
    pub fn into_result(self) -> PanelResult<Value> {
        if self.ok {
            Ok(self.data)
        } else {
            let code = self.error.unwrap_or_else(|| "UNKNOWN".to_string());
            Err(PanelError::from_wire(&code, self.message))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Bot as reported by a socket panel; `status` is `0` offline, `1` connecting, `2` online.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBot {
    pub template_name: String,
    pub status: u8,
}

impl From<WireBot> for RemoteBot {
    fn from(bot: WireBot) -> Self {
        RemoteBot {
            template_name: bot.template_name,
            status: ConnectionStatus::from_panel_code(bot.status),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotLogPayload {
    pub template_name: String,
    pub line: String,
}
