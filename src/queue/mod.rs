//! The `queue` module defines the narrow surface through which the broker
//! talks to the external queue service.
//!
//! The transport itself (polling protocol, visibility timeouts, redelivery,
//! persistence) is an external collaborator. The broker only consumes a
//! stream of [`QueueEvent`]s and calls back through [`QueueService`] to
//! delete messages and to pause or resume polling.

pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A message as received from the queue service.
///
/// Ephemeral; it exists only for the duration of one poll callback.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Opaque identifier assigned by the queue service.
    pub id: String,
    /// The full message body, including the colon-delimited address.
    pub body: String,
    /// How many times the queue service has delivered this message.
    pub receive_count: u32,
    /// When the message was originally sent.
    pub sent: DateTime<Utc>,
}

/// Inbound events driving the broker's state machine.
#[derive(Debug)]
pub enum QueueEvent {
    /// A message became visible on the queue. The broker peeks without
    /// consuming, so only the concurrency gate reacts to this.
    Available(RawMessage),
    /// The message data is ready for processing.
    Data(RawMessage),
    /// The queue service itself failed.
    Error { cause: String, body: String },
}

/// Operations the broker performs against the queue service.
///
/// `pause` and `resume` are bound to the concurrency gate's engine callback:
/// polling stops once the gate is full and restarts when a slot frees up.
pub trait QueueService: Send + Sync {
    /// Acknowledge a message, removing it from the queue.
    fn delete(&self, id: &str);
    /// Stop polling for further messages.
    fn pause(&self);
    /// Resume polling.
    fn resume(&self);
}

/// Shared handle to the queue service, also passed to workers.
pub type QueueHandle = Arc<dyn QueueService>;
