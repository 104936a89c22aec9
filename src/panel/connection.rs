//! Persistent socket connection to one manager-bot or rank-system panel.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    error::panel::{PanelError, PanelErrorCode},
    model::bot::{BotFamily, BotTemplate, RemoteBot},
    panel::{
        backoff::ReconnectPolicy,
        frame::{self, BotLogPayload, InboundFrame, RequestFrame, WireBot},
        PanelApi, PanelResult,
    },
    service::bot_log::BotLogStore,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Timing shared by every socket panel connection.
#[derive(Debug, Clone, Copy)]
pub struct SocketSettings {
    /// How long a call waits for the panel's acknowledgement.
    pub rpc_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// State shared between the connection handle and its background task.
#[derive(Default)]
struct Shared {
    /// Sender into the live socket, `None` while disconnected.
    outgoing: Mutex<Option<mpsc::Sender<RequestFrame>>>,
    /// Calls waiting for their acknowledgement, by request id.
    pending: Mutex<HashMap<String, oneshot::Sender<PanelResult<Value>>>>,
}

impl Shared {
    fn resolve(&self, id: &str, result: PanelResult<Value>) {
        match self.pending.lock().remove(id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!(request_id = %id, "acknowledgement for unknown or expired request"),
        }
    }

    /// Drops the live sender and fails every waiting call.
    fn disconnect(&self) {
        *self.outgoing.lock() = None;
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(PanelError::unreachable("connection lost")));
        }
    }
}

/// Where and how a connection dials.
struct Target {
    family: BotFamily,
    label: String,
    url: Url,
    token: String,
}

/// Authenticated, auto-reconnecting socket client for one panel.
///
/// Construction never fails on an unreachable panel: the first dial happens in a
/// background task that retries forever with `ReconnectPolicy`. Calls made while the
/// socket is down fail immediately with `PANEL_UNREACHABLE` instead of queueing.
pub struct PanelConnection {
    label: String,
    shared: Arc<Shared>,
    rpc_timeout: Duration,
    task: JoinHandle<()>,
}

impl PanelConnection {
    /// Starts connecting to `host` in the background.
    ///
    /// `host` may use a `ws`, `wss`, `http` or `https` scheme; HTTP schemes are dialled
    /// as their socket equivalents. Must be called inside a Tokio runtime.
    ///
    /// # Arguments
    /// - `family` - Bot family of the panel, used for logs and bot log files
    /// - `panel_id` - Panel row id, `None` for the singleton rank panel
    /// - `host` - Panel URL
    /// - `token` - Bearer token sent with the handshake
    ///
    /// # Returns
    /// - `Ok(PanelConnection)` - Connection handle; the socket may not be up yet
    /// - `Err(PanelError)` - `host` is not a valid URL
    pub fn spawn(
        family: BotFamily,
        panel_id: Option<i32>,
        host: &str,
        token: &str,
        settings: SocketSettings,
        logs: BotLogStore,
    ) -> PanelResult<Self> {
        let label = match panel_id {
            Some(id) => format!("{} panel {}", family, id),
            None => format!("{} panel", family),
        };
        let target = Target {
            family,
            label: label.clone(),
            url: socket_url(host)?,
            token: token.to_string(),
        };
        let shared = Arc::new(Shared::default());
        let task = tokio::spawn(run(target, shared.clone(), settings.reconnect, logs));

        Ok(Self {
            label,
            shared,
            rpc_timeout: settings.rpc_timeout,
            task,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.shared.outgoing.lock().is_some()
    }

    /// Sends one request and waits for its acknowledgement.
    async fn call(&self, method: &'static str, params: Value) -> PanelResult<Value> {
        let outgoing = self.shared.outgoing.lock().clone();
        let Some(outgoing) = outgoing else {
            return Err(PanelError::unreachable(format!(
                "{} is not connected",
                self.label
            )));
        };

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id.clone(), tx);

        if outgoing
            .send(RequestFrame::new(id.clone(), method, params))
            .await
            .is_err()
        {
            self.shared.pending.lock().remove(&id);
            return Err(PanelError::unreachable(format!(
                "{} disconnected",
                self.label
            )));
        }

        match timeout(self.rpc_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PanelError::unreachable(format!(
                "{} closed before acknowledging {}",
                self.label, method
            ))),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                Err(PanelError::timeout(format!(
                    "{} did not acknowledge {} within {:?}",
                    self.label, method, self.rpc_timeout
                )))
            }
        }
    }

    async fn call_for_bot(&self, method: &'static str, template_name: &str) -> PanelResult<Value> {
        self.call(method, json!({ "templateName": template_name }))
            .await
    }
}

impl Drop for PanelConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl PanelApi for PanelConnection {
    async fn create_bot(&self, template: &BotTemplate) -> PanelResult<()> {
        let params = serde_json::to_value(template).map_err(|e| {
            PanelError::new(PanelErrorCode::Other("INVALID_TEMPLATE".to_string()), e.to_string())
        })?;
        self.call(frame::CREATE_BOT, params).await.map(|_| ())
    }

    async fn delete_bot(&self, template_name: &str) -> PanelResult<()> {
        self.call_for_bot(frame::DELETE_BOT, template_name)
            .await
            .map(|_| ())
    }

    async fn connect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.call_for_bot(frame::CONNECT_BOT, template_name)
            .await
            .map(|_| ())
    }

    async fn disconnect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.call_for_bot(frame::DISCONNECT_BOT, template_name)
            .await
            .map(|_| ())
    }

    async fn reconnect_bot(&self, template_name: &str) -> PanelResult<()> {
        self.call_for_bot(frame::RECONNECT_BOT, template_name)
            .await
            .map(|_| ())
    }

    async fn bot_info(&self, template_name: &str) -> PanelResult<RemoteBot> {
        let data = self.call_for_bot(frame::GET_BOT_INFO, template_name).await?;
        decode::<WireBot>(data).map(RemoteBot::from)
    }

    async fn bot_list(&self) -> PanelResult<Vec<RemoteBot>> {
        let data = self.call(frame::GET_BOT_LIST, Value::Null).await?;
        let bots = decode::<Vec<WireBot>>(data)?;
        Ok(bots.into_iter().map(RemoteBot::from).collect())
    }

    fn dispose(&self) {
        self.task.abort();
        self.shared.disconnect();
        info!(panel = %self.label, "panel connection disposed");
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

fn socket_url(host: &str) -> PanelResult<Url> {
    let mut url = Url::parse(host)
        .map_err(|e| PanelError::unreachable(format!("invalid panel host '{}': {}", host, e)))?;

    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| PanelError::unreachable(format!("invalid panel host '{}'", host)))?;
    }

    Ok(url)
}

async fn dial(target: &Target) -> PanelResult<Socket> {
    let mut request = target
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| PanelError::unreachable(e.to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", target.token))
        .map_err(|e| PanelError::unreachable(format!("invalid panel token: {}", e)))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (socket, _) = connect_async(request)
        .await
        .map_err(|e| PanelError::unreachable(e.to_string()))?;
    Ok(socket)
}

/// Dial, serve until the socket drops, back off, repeat. Runs until aborted.
async fn run(target: Target, shared: Arc<Shared>, policy: ReconnectPolicy, logs: BotLogStore) {
    let mut attempt: u32 = 0;

    loop {
        match timeout(policy.handshake_timeout, dial(&target)).await {
            Ok(Ok(socket)) => {
                if attempt > 0 {
                    info!(panel = %target.label, attempts = attempt, "panel reconnected");
                } else {
                    info!(panel = %target.label, "panel connected");
                }
                attempt = 0;
                serve(socket, &target, &shared, &logs).await;
                warn!(panel = %target.label, "panel disconnected");
            }
            Ok(Err(e)) => {
                debug!(panel = %target.label, error = %e, "panel connect attempt failed");
            }
            Err(_) => {
                warn!(
                    panel = %target.label,
                    timeout = ?policy.handshake_timeout,
                    "panel handshake timed out"
                );
            }
        }

        shared.disconnect();
        let delay = policy.delay(attempt);
        attempt = attempt.saturating_add(1);
        tokio::time::sleep(delay).await;
    }
}

async fn serve(socket: Socket, target: &Target, shared: &Shared, logs: &BotLogStore) {
    let (mut write, mut read) = socket.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<RequestFrame>(64);
    *shared.outgoing.lock() = Some(outgoing_tx);

    loop {
        tokio::select! {
            Some(request) = outgoing_rx.recv() => {
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(e) => {
                        shared.resolve(&request.id, Err(PanelError::unreachable(e.to_string())));
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!(panel = %target.label, error = %e, "panel send failed");
                    shared.resolve(&request.id, Err(PanelError::unreachable(e.to_string())));
                    break;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_text(&text, target, shared, logs).await,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(panel = %target.label, error = %e, "panel socket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn handle_text(text: &str, target: &Target, shared: &Shared, logs: &BotLogStore) {
    let frame = match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(panel = %target.label, error = %e, "ignoring unparsable panel frame");
            return;
        }
    };

    match frame {
        InboundFrame::Ack(ack) => {
            let id = ack.id.clone();
            shared.resolve(&id, ack.into_result());
        }
        InboundFrame::Event(event) if event.event == frame::BOT_LOG_EVENT => {
            match serde_json::from_value::<BotLogPayload>(event.payload) {
                Ok(log) => {
                    if let Err(e) = logs.append(target.family, &log.template_name, &log.line).await {
                        warn!(
                            panel = %target.label,
                            template_name = %log.template_name,
                            error = %e,
                            "failed to write bot log"
                        );
                    }
                }
                Err(e) => debug!(panel = %target.label, error = %e, "malformed bot.log event"),
            }
        }
        InboundFrame::Event(event) => {
            debug!(panel = %target.label, event = %event.event, "unhandled panel event");
        }
    }
}
