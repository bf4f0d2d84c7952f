//! Headless, topic-carrying message bus between the broker and the bridge.
//!
//! # Lanes
//!
//! | Lane | Channel | Typical traffic |
//! |---|---|---|
//! | inbound | bounded [`tokio::sync::mpsc`], one consumer | Controller telemetry received from the broker |
//! | outbound | [`tokio::sync::broadcast`] | Control commands on their way to the broker |
//!
//! The inbound lane never drops: [`MessageBus::deliver`] waits for room, so
//! a slow consumer pushes back on the broker connection instead of losing
//! messages.  Every [`BusMessage`] keeps its transport topic string.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plcbridge_types::BridgeError;
use tokio::sync::{broadcast, mpsc};

use crate::link::OutboundLink;

/// Default channel capacity (messages buffered per lane).
pub const DEFAULT_CAPACITY: usize = 256;

/// One message as it travels over the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    /// Transport topic, e.g. `"Wago750/Status"`.
    pub topic: String,
    /// Textual payload, exactly as received.
    pub payload: String,
    /// When the bus accepted the message.
    pub received_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Shared message bus. Clone it cheaply – all clones feed the same inbound
/// queue and share the same outbound channel.
#[derive(Clone, Debug)]
pub struct MessageBus {
    inbound: mpsc::Sender<BusMessage>,
    outbound: broadcast::Sender<BusMessage>,
}

impl MessageBus {
    /// Create a bus whose lanes each buffer `capacity` messages.
    ///
    /// The returned receiver is the single consumer of the inbound lane; the
    /// inbound lane closes once every bus clone is dropped.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BusMessage>) {
        let (inbound, inbound_rx) = mpsc::channel(capacity);
        let (outbound, _) = broadcast::channel(capacity);
        (Self { inbound, outbound }, inbound_rx)
    }

    /// Queue `message` on the inbound lane, waiting while the lane is full.
    ///
    /// Returns [`BridgeError::Transport`] once the consumer has gone away.
    pub async fn deliver(&self, message: BusMessage) -> Result<(), BridgeError> {
        self.inbound.send(message).await.map_err(|e| {
            BridgeError::Transport(format!("inbound lane closed, dropped {}", e.0.topic))
        })
    }

    /// Publish `message` on the outbound lane.
    ///
    /// Returns the number of active receivers that were handed the message,
    /// or [`BridgeError::Transport`] when nobody is listening.
    pub fn publish(&self, message: BusMessage) -> Result<usize, BridgeError> {
        self.outbound.send(message).map_err(|e| {
            BridgeError::Transport(format!("no outbound subscriber for {}", e.0.topic))
        })
    }

    /// Subscribe to every message on the outbound lane.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.outbound.subscribe()
    }
}

/// The in-process bus is itself an outbound link: commands land on the
/// outbound lane, where a transport task (or a test) picks them up.
#[async_trait]
impl OutboundLink for MessageBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError> {
        MessageBus::publish(self, BusMessage::new(topic, payload)).map(|_| ())
    }
}
