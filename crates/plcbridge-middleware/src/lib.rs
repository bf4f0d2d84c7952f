//! `plcbridge-middleware` – message plumbing between the broker and the
//! bridge core.
//!
//! Routes raw `(topic, payload)` traffic without caring about what it means.
//!
//! # Modules
//!
//! - [`bus`] – in-process bus with a bounded inbound queue and a broadcast
//!   outbound lane.
//! - [`link`] – [`OutboundLink`], the seam command publishers write to.
//! - [`mqtt`] – [`MqttLink`], which pumps broker traffic onto the bus and
//!   sends the outbound lane back to the broker.

pub mod bus;
pub mod link;
pub mod mqtt;

pub use bus::{BusMessage, DEFAULT_CAPACITY, MessageBus};
pub use link::OutboundLink;
pub use mqtt::{MqttLink, MqttSettings};
