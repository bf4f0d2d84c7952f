//! The outbound link seam.
//!
//! The bridge never talks to a broker client directly when it emits a
//! command.  It hands the message to an [`OutboundLink`]; the link decides
//! how it reaches the outside world.
//!
//! - [`MessageBus`][crate::bus::MessageBus] – puts the message on the
//!   in-process outbound lane.
//! - [`MqttLink`][crate::mqtt::MqttLink] – publishes to the MQTT broker.

use async_trait::async_trait;
use plcbridge_types::BridgeError;

/// Every outbound transport must implement this trait.
///
/// # Contract
///
/// One call is one message on the wire.  Implementations do not retry; a
/// failure is returned as [`BridgeError::Transport`].
#[async_trait]
pub trait OutboundLink: Send + Sync {
    /// Emit `payload` addressed to `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError>;
}
