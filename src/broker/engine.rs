use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::broker::request::Request;
use crate::config::Settings;
use crate::queue::{QueueEvent, QueueHandle, RawMessage};
use crate::router::{RouteOutcome, Router};
use crate::throttle::{Admission, Throttle};
use crate::utils::error::QueueError;
use crate::workers::Registry;

/// Polls the queue service for messages, builds requests for the router and
/// interprets worker outcomes to decide acknowledgment.
///
/// The broker is the only component that classifies and reports errors;
/// everything below it signals outcomes and stays quiet.
pub struct Broker {
    settings: Settings,
    queue: QueueHandle,
    throttle: Throttle,
    router: Router,
}

impl Broker {
    /// Wire the broker up: the throttle's engine callback drives the queue
    /// service's pause/resume so polling stops while the gate is full.
    pub fn new(
        settings: &Settings,
        queue: QueueHandle,
        registry: Arc<Registry>,
    ) -> Result<Arc<Self>, regex::Error> {
        let engine_queue = queue.clone();
        let throttle = Throttle::new(
            &settings.throttle,
            Box::new(move |start, stop| {
                if start {
                    engine_queue.resume();
                }
                if stop {
                    engine_queue.pause();
                }
            }),
        )?;

        Ok(Arc::new(Self {
            settings: settings.clone(),
            queue,
            throttle,
            router: Router::new(registry),
        }))
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Consume queue events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: UnboundedReceiver<QueueEvent>) {
        while let Some(event) = events.recv().await {
            self.clone().dispatch(event);
        }
    }

    /// Advance the state machine by one queue event.
    ///
    /// Accepted messages are handled on their own task so multiple workers
    /// can be in flight; the returned handle resolves when processing for
    /// this message concludes.
    pub fn dispatch(self: Arc<Self>, event: QueueEvent) -> Option<JoinHandle<()>> {
        match event {
            // peek without consuming; only the gate reacts here
            QueueEvent::Available(_) => {
                self.throttle.increase();
                None
            }
            QueueEvent::Data(msg) => match self.throttle.admit(&msg.body) {
                Admission::Accepted => {
                    Some(tokio::spawn(async move { self.handle_message(msg).await }))
                }
                // leave the message for the queue's own redelivery, but
                // release the slot claimed when it became available
                Admission::Rejected => {
                    self.throttle.decrease();
                    None
                }
            },
            QueueEvent::Error { cause, body } => {
                QueueError::Broker { id: body, cause }.report();
                None
            }
        }
    }

    /// Route one admitted message, decide acknowledgment from its outcome
    /// and release its concurrency slot.
    pub async fn handle_message(&self, msg: RawMessage) {
        let mut req = Request::from_raw(&msg, &self.settings.broker);

        tracing::debug!(id = %req.message, "routing message");
        let outcome = self.router.route(&mut req, self.queue.clone()).await;

        let (ack, error) = interpret(&req, &outcome, Utc::now());
        if let Some(err) = error {
            err.report();
        }
        if ack {
            self.queue.delete(&msg.id);
        }

        self.throttle.decrease();
    }
}

/// Map a completed request to an acknowledgment decision and at most one
/// error classification.
///
/// The overlapping conditions are re-evaluated in a fixed priority order and
/// only the last applicable classification is kept: Worker < Exceeded <
/// Invalid < Timeout. A message is acknowledged when the worker reported no
/// failure or when its retry budget is spent.
pub fn interpret(
    req: &Request,
    outcome: &RouteOutcome,
    now: DateTime<Utc>,
) -> (bool, Option<QueueError>) {
    let failure = match outcome {
        RouteOutcome::Unrouted => None,
        RouteOutcome::Completed(Ok(())) => None,
        RouteOutcome::Completed(Err(err)) => Some(err),
    };

    let mut classified = None;

    if let Some(err) = failure {
        classified = Some(QueueError::Worker {
            id: req.message.clone(),
            cause: err.to_string(),
        });

        if req.retries == 0 {
            classified = Some(QueueError::Exceeded {
                id: req.message.clone(),
            });
        }

        // a failure with no resolved address should not be possible; an
        // unrouted message completes without error and is dropped silently
        if req.address.is_empty() {
            classified = Some(QueueError::Invalid {
                id: req.message.clone(),
            });
        }
    }

    if now > req.deadline {
        classified = Some(QueueError::Timeout {
            id: req.message.clone(),
        });
    }

    let ack = failure.is_none() || req.retries == 0;
    (ack, classified)
}
