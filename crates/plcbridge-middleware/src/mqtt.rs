//! [`MqttLink`] – bridges an MQTT broker to the [`MessageBus`].
//!
//! * Every PUBLISH received from the broker becomes a [`BusMessage`] on the
//!   inbound lane.  Delivery is awaited, so a full lane pauses the poll loop.
//! * Every message on the outbound lane is sent to the broker as a QoS 1
//!   PUBLISH through [`OutboundLink::publish`].
//!
//! Session handling (keep-alive, reconnect) is left to `rumqttc`; the poll
//! loop only logs failures and backs off for a second between them.  The
//! subscription set is re-sent on every CONNACK so a reconnect with a clean
//! session keeps receiving.

use std::time::Duration;

use async_trait::async_trait;
use plcbridge_types::BridgeError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bus::{BusMessage, MessageBus};
use crate::link::OutboundLink;

/// Capacity of the request channel between [`AsyncClient`] and its event loop.
const REQUEST_CAPACITY: usize = 64;

/// Delay after a failed poll before polling again.
const POLL_BACKOFF: Duration = Duration::from_secs(1);

/// Broker connection settings.
#[derive(Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            options.set_credentials(user, pass);
        }
        options
    }
}

/// Handle to a live broker connection.
///
/// Cloning is cheap; all clones publish through the same client.
#[derive(Clone)]
pub struct MqttLink {
    client: AsyncClient,
}

impl MqttLink {
    /// Start a connection to the broker described by `settings`.
    ///
    /// `topics` are subscribed with QoS 1 on every successful connect.  The
    /// returned set holds two tasks: one drives the connection and delivers
    /// received messages to `bus`, the other sends the bus's outbound lane
    /// to the broker.  Abort the set to disconnect.
    pub fn start(settings: &MqttSettings, topics: Vec<String>, bus: MessageBus) -> JoinSet<()> {
        let (client, eventloop) = AsyncClient::new(settings.options(), REQUEST_CAPACITY);
        let broker = format!("{}:{}", settings.host, settings.port);
        let link = Self {
            client: client.clone(),
        };

        let mut tasks = JoinSet::new();
        tasks.spawn(forward(bus.subscribe(), link));
        tasks.spawn(drive(eventloop, client, topics, bus, broker));
        tasks
    }
}

#[async_trait]
impl OutboundLink for MqttLink {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.into_bytes())
            .await
            .map_err(|e| BridgeError::Transport(format!("MQTT publish to {topic} failed: {e}")))
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Vec<String>,
    bus: MessageBus,
    broker: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(%broker, "MQTT connection successful");
                for topic in &topics {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        warn!(%topic, error = %e, "MQTT subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = to_bus_message(&publish);
                debug!(topic = %message.topic, "MQTT message received");
                if let Err(e) = bus.deliver(message).await {
                    warn!(error = %e, "inbound lane closed; stopping MQTT link");
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(%broker, error = %e, "MQTT connection failed");
                tokio::time::sleep(POLL_BACKOFF).await;
            }
        }
    }
}

/// Send every outbound bus message to the broker until the bus is gone.
async fn forward(mut outbound: broadcast::Receiver<BusMessage>, link: impl OutboundLink) {
    loop {
        match outbound.recv().await {
            Ok(message) => {
                if let Err(e) = link.publish(&message.topic, message.payload).await {
                    error!(topic = %message.topic, error = %e, "outbound message not sent");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "outbound forwarder lagged; commands lost");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Payloads are textual; invalid UTF-8 is replaced rather than rejected so
/// the decoder can report the message as malformed.
fn to_bus_message(publish: &Publish) -> BusMessage {
    BusMessage::new(
        publish.topic.clone(),
        String::from_utf8_lossy(&publish.payload).into_owned(),
    )
}
