//! Fire-and-forget fan-out of bot state changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::model::bot::{BotFamily, ConnectionStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotEventKind {
    Created,
    StatusChanged { status: ConnectionStatus },
    Suspended,
    Activated,
    Extended { expires_at: Option<DateTime<Utc>> },
    Edited,
    Deleted { refunded: i64 },
    /// Intermediate step of a slow operation, for "still working" feedback.
    Progress { message: String },
}

/// One state change of one bot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotEvent {
    /// User the change was made for; `None` for scheduled jobs.
    pub actor: Option<String>,
    pub family: BotFamily,
    /// `None` for progress of a bot that is not persisted yet.
    pub bot_id: Option<i32>,
    #[serde(flatten)]
    pub kind: BotEventKind,
}

/// Broadcast channel of `BotEvent`s.
///
/// Events naming a bot are published only after the corresponding write has been
/// persisted. Publishing never blocks and never fails: with no subscribers the event is dropped,
/// and slow subscribers lag rather than hold up the publisher.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: BotEvent) {
        if self.tx.send(event).is_err() {
            trace!("bot event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: BotEventKind) -> BotEvent {
        BotEvent {
            actor: Some("alice".to_string()),
            family: BotFamily::ManagerBot,
            bot_id: Some(1),
            kind,
        }
    }

    #[tokio::test]
    async fn delivers_to_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(event(BotEventKind::Suspended));

        assert_eq!(rx.recv().await.unwrap().kind, BotEventKind::Suspended);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(8);

        bus.publish(event(BotEventKind::Created));
    }

    #[test]
    fn serializes_flat_with_type_tag() {
        let value = serde_json::to_value(event(BotEventKind::StatusChanged {
            status: ConnectionStatus::Online,
        }))
        .unwrap();

        assert_eq!(value["type"], "status_changed");
        assert_eq!(value["status"], "online");
        assert_eq!(value["family"], "manager_bot");
        assert_eq!(value["bot_id"], 1);
    }
}
