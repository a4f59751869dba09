use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::config::BrokerSettings;
use crate::queue::RawMessage;

/// The per-message request handed to the router and workers.
///
/// Built once for each admitted message and dropped when processing
/// completes. The router fills in `address` and `data`; the broker's outcome
/// interpretation reads the rest.
#[derive(Debug, Clone)]
pub struct Request {
    /// The full message body.
    pub message: String,
    /// The resolved address segments; empty until a worker matches.
    pub address: Vec<String>,
    /// Decoded payload data; absent until a worker matches.
    pub data: Option<Value>,
    /// The remaining number of times this message will be retried before
    /// being deleted. Derived solely from the queue service's receive
    /// count; never decremented in-process.
    pub retries: u32,
    /// When this message is considered timed out.
    pub deadline: DateTime<Utc>,
    /// How long the message had been queued when the broker received it.
    pub age: Duration,
    /// When the message was originally sent.
    pub sent: DateTime<Utc>,
}

impl Request {
    pub fn from_raw(msg: &RawMessage, settings: &BrokerSettings) -> Self {
        Self::from_raw_at(msg, settings, Utc::now())
    }

    pub(crate) fn from_raw_at(
        msg: &RawMessage,
        settings: &BrokerSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            message: msg.body.clone(),
            address: Vec::new(),
            data: None,
            retries: settings.retries.saturating_sub(msg.receive_count),
            deadline: now + Duration::seconds(settings.timeout_secs as i64),
            age: now - msg.sent,
            sent: msg.sent,
        }
    }
}
