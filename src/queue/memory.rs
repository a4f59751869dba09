//! An in-process queue transport.
//!
//! `MemoryQueue` forwards pushed messages straight onto the broker's event
//! channel. It carries no visibility or redelivery mechanics; those belong to
//! a real queue service. It is used by the binary's local mode and stands in
//! for the external service in broker tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::queue::{QueueEvent, QueueService, RawMessage};

#[derive(Debug)]
pub struct MemoryQueue {
    events: mpsc::UnboundedSender<QueueEvent>,
    paused: AtomicBool,
    held: Mutex<VecDeque<RawMessage>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryQueue {
    /// Create a queue and the event receiver the broker will consume.
    pub fn channel() -> (Arc<MemoryQueue>, mpsc::UnboundedReceiver<QueueEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(MemoryQueue {
            events: tx,
            paused: AtomicBool::new(false),
            held: Mutex::new(VecDeque::new()),
            deleted: Mutex::new(Vec::new()),
        });
        (queue, rx)
    }

    /// Push a message body onto the queue, returning its assigned id.
    pub fn push(&self, body: &str) -> String {
        let msg = RawMessage {
            id: format!("msg-{}", Uuid::new_v4()),
            body: body.to_string(),
            receive_count: 1,
            sent: Utc::now(),
        };
        let id = msg.id.clone();
        self.push_raw(msg);
        id
    }

    /// Push a fully specified message, keeping its receive count and
    /// send timestamp.
    pub fn push_raw(&self, msg: RawMessage) {
        if self.paused.load(Ordering::SeqCst) {
            self.held.lock().unwrap().push_back(msg);
        } else {
            self.emit(msg);
        }
    }

    fn emit(&self, msg: RawMessage) {
        // Receiver may already be gone during shutdown; dropping the
        // message is fine then.
        let _ = self.events.send(QueueEvent::Available(msg.clone()));
        let _ = self.events.send(QueueEvent::Data(msg));
    }

    /// Ids of all messages acknowledged so far.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

impl QueueService for MemoryQueue {
    fn delete(&self, id: &str) {
        self.deleted.lock().unwrap().push(id.to_string());
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        if !self.paused.swap(false, Ordering::SeqCst) {
            return;
        }

        let held: Vec<RawMessage> = self.held.lock().unwrap().drain(..).collect();
        for msg in held {
            self.emit(msg);
        }
    }
}
