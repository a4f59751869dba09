//! The `error` module defines the failure taxonomy used by the broker when
//! interpreting message outcomes.
//!
//! Classification happens centrally in the broker; the router, throttle and
//! worker registry only signal outcomes and never report errors themselves.
//! Every classified error carries the originating message body as its
//! identifier and is emitted to the log sink at its severity level.

use thiserror::Error;

/// The failure value a worker may report when it completes.
///
/// Workers are arbitrary operator-supplied callables, so this is kept as a
/// boxed error rather than a concrete type.
pub type WorkerError = Box<dyn std::error::Error + Send + Sync>;

/// Severity attached to each classified error.
///
/// Broker and worker failures are operational errors; an exhausted retry
/// budget, a missed deadline or an unroutable message are warnings, since the
/// queue's own redelivery mechanics already account for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warn,
}

/// Classified failure produced by the broker's outcome interpretation.
///
/// Exactly one classification is reported per message outcome.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A queue-service-level failure, not tied to any single message's
    /// retry budget.
    #[error("Queue service failure: {cause}")]
    Broker { id: String, cause: String },

    /// The worker reported a failure and retries remain.
    #[error("Worker processing failed: {cause}")]
    Worker { id: String, cause: String },

    /// The worker reported a failure and the retry budget is exhausted.
    #[error("Message attempts failed")]
    Exceeded { id: String },

    /// The worker completed after the message's processing deadline.
    #[error("Message processing timeout")]
    Timeout { id: String },

    /// The message resolved to no address yet still produced an error.
    #[error("Invalid message signature")]
    Invalid { id: String },
}

impl QueueError {
    /// The identifier of the message that produced this error.
    pub fn id(&self) -> &str {
        match self {
            QueueError::Broker { id, .. }
            | QueueError::Worker { id, .. }
            | QueueError::Exceeded { id }
            | QueueError::Timeout { id }
            | QueueError::Invalid { id } => id,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            QueueError::Broker { .. } | QueueError::Worker { .. } => Severity::Error,
            QueueError::Exceeded { .. } | QueueError::Timeout { .. } | QueueError::Invalid { .. } => {
                Severity::Warn
            }
        }
    }

    /// Emit this error to the log sink at its severity level.
    pub fn report(&self) {
        match self.severity() {
            Severity::Error => tracing::error!(id = %self.id(), "{}", self),
            Severity::Warn => tracing::warn!(id = %self.id(), "{}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_matches_error_kind() {
        let broker = QueueError::Broker {
            id: "msg".into(),
            cause: "connection lost".into(),
        };
        let worker = QueueError::Worker {
            id: "msg".into(),
            cause: "boom".into(),
        };
        let exceeded = QueueError::Exceeded { id: "msg".into() };
        let timeout = QueueError::Timeout { id: "msg".into() };
        let invalid = QueueError::Invalid { id: "msg".into() };

        assert_eq!(broker.severity(), Severity::Error);
        assert_eq!(worker.severity(), Severity::Error);
        assert_eq!(exceeded.severity(), Severity::Warn);
        assert_eq!(timeout.severity(), Severity::Warn);
        assert_eq!(invalid.severity(), Severity::Warn);
    }

    #[test]
    fn id_is_the_message_body() {
        let err = QueueError::Exceeded {
            id: "sms:send:123".into(),
        };
        assert_eq!(err.id(), "sms:send:123");
    }

    #[test]
    fn display_uses_original_messages() {
        let exceeded = QueueError::Exceeded { id: "x".into() };
        let timeout = QueueError::Timeout { id: "x".into() };
        let invalid = QueueError::Invalid { id: "x".into() };

        assert_eq!(exceeded.to_string(), "Message attempts failed");
        assert_eq!(timeout.to_string(), "Message processing timeout");
        assert_eq!(invalid.to_string(), "Invalid message signature");
    }
}
