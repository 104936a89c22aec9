//! HTTP client for audio-bot panels.
//!
//! Audio panels expose a REST API instead of a socket, so there is no persistent
//! connection: every operation is one authenticated request with its own timeout, and
//! reachability is inferred from connection errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{
    error::panel::{PanelError, PanelErrorCode},
    model::bot::{BotTemplate, ConnectionStatus, RemoteBot},
    panel::{PanelApi, PanelResult},
};

/// Response envelope: `data` on success, `error` (a machine readable code) on failure.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudioBot {
    name: String,
    state: String,
}

impl From<AudioBot> for RemoteBot {
    fn from(bot: AudioBot) -> Self {
        let status = match bot.state.as_str() {
            "running" => ConnectionStatus::Online,
            "starting" => ConnectionStatus::Connecting,
            _ => ConnectionStatus::Offline,
        };
        RemoteBot {
            template_name: bot.name,
            status,
        }
    }
}

pub struct AudioPanelClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    timeout: Duration,
}

impl AudioPanelClient {
    /// Creates a client for the panel at `host`.
    ///
    /// # Returns
    /// - `Ok(AudioPanelClient)` - Client ready for use
    /// - `Err(PanelError)` - `host` is not a usable base URL
    pub fn new(
        http: reqwest::Client,
        host: &str,
        token: &str,
        timeout: Duration,
    ) -> PanelResult<Self> {
        let base = Url::parse(host)
            .map_err(|e| PanelError::unreachable(format!("invalid panel host '{}': {}", host, e)))?;
        if base.cannot_be_a_base() {
            return Err(PanelError::unreachable(format!(
                "invalid panel host '{}'",
                host
            )));
        }

        Ok(Self {
            http,
            base,
            token: token.to_string(),
            timeout,
        })
    }

    /// `{base}/api/v1/bots[/{segments}...]`, with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> PanelResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PanelError::unreachable(format!("invalid panel host '{}'", self.base)))?
            .pop_if_empty()
            .extend(["api", "v1", "bots"])
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&BotTemplate>,
    ) -> PanelResult<Value> {
        let url = self.url(segments)?;
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        let envelope = match serde_json::from_slice::<Envelope>(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() && !body.is_empty() => {
                return Err(PanelError::new(
                    PanelErrorCode::Other("INVALID_RESPONSE".to_string()),
                    e.to_string(),
                ))
            }
            Err(_) => Envelope {
                data: Value::Null,
                error: None,
                message: None,
            },
        };

        match envelope.error {
            Some(code) => Err(PanelError::from_wire(&code, envelope.message)),
            None if status == StatusCode::NOT_FOUND => Err(PanelError::new(
                PanelErrorCode::NotFound,
                envelope.message.unwrap_or_else(|| segments.join("/")),
            )),
            None if !status.is_success() => Err(PanelError::new(
                PanelErrorCode::Other(format!("HTTP_{}", status.as_u16())),
                envelope.message.unwrap_or_else(|| status.to_string()),
            )),
            None => Ok(envelope.data),
        }
    }
}

fn transport_error(err: reqwest::Error) -> PanelError {
    if err.is_timeout() {
        PanelError::timeout(err.to_string())
    } else {
        PanelError::unreachable(err.to_string())
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: Value) -> PanelResult<T> {
    serde_json::from_value(data).map_err(|e| {
        PanelError::new(
            PanelErrorCode::Other("INVALID_RESPONSE".to_string()),
            e.to_string(),
        )
    })
}

#[async_trait]
impl PanelApi for AudioPanelClient {
    async fn create_bot(&self, template: &BotTemplate) -> PanelResult<()> {
        self.request(Method::POST, &[], Some(template))
            .await
            .map(|_| ())
    }

    async fn delete_bot(&self, template_name: &str) -> PanelResult<()> {
        self.request(Method::DELETE, &[template_name], None)
            .await
            .map(|_| ())
    }

    async fn connect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.request(Method::POST, &[template_name, "connect"], None)
            .await
            .map(|_| ())
    }

    async fn disconnect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.request(Method::POST, &[template_name, "disconnect"], None)
            .await
            .map(|_| ())
    }

    async fn reconnect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.request(Method::POST, &[template_name, "reconnect"], None)
            .await
            .map(|_| ())
    }

    async fn bot_info(&self, template_name: &str) -> PanelResult<RemoteBot> {
        let data = self.request(Method::GET, &[template_name], None).await?;
        decode::<AudioBot>(data).map(RemoteBot::from)
    }

    async fn bot_list(&self) -> PanelResult<Vec<RemoteBot>> {
        let data = self.request(Method::GET, &[], None).await?;
        let bots = decode::<Vec<AudioBot>>(data)?;
        Ok(bots.into_iter().map(RemoteBot::from).collect())
    }
}
