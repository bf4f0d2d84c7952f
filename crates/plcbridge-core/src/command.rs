//! [`CommandPublisher`] – the only path from a control request back onto the
//! bus.
//!
//! A request carries an integer code.  Codes outside `[0, 3]` are rejected
//! before anything is sent; a valid code is published once, as its decimal
//! string, to [`CONTROL_TOPIC`].
//!
//! The control topic is a fixed constant.  It is deliberately not taken from
//! the inbound [`TopicBinding`][crate::topics::TopicBinding]: the controller
//! reports on one topic and listens on another.

use std::sync::Arc;

use plcbridge_middleware::OutboundLink;
use plcbridge_types::{BridgeError, ControlCommand};
use tracing::{info, warn};

/// Topic the controller listens on for control codes.
pub const CONTROL_TOPIC: &str = "Wago750/Control";

pub struct CommandPublisher {
    link: Arc<dyn OutboundLink>,
}

impl CommandPublisher {
    pub fn new(link: Arc<dyn OutboundLink>) -> Self {
        Self { link }
    }

    /// Validate `code` and publish it.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::CommandOutOfRange`] – `code` is outside `[0, 3]`;
    ///   nothing was published.
    /// - [`BridgeError::Transport`] – the link refused the message.
    pub async fn send_command(&self, code: i64) -> Result<ControlCommand, BridgeError> {
        let command = ControlCommand::new(code).inspect_err(|_| {
            warn!(code, "control command rejected");
        })?;
        self.link.publish(CONTROL_TOPIC, command.payload()).await?;
        info!(code = command.code(), topic = CONTROL_TOPIC, "control command sent");
        Ok(command)
    }
}
