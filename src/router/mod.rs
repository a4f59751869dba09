//! The `router` module resolves an inbound message's colon-delimited address
//! against the worker registry and invokes the matched worker.
//!
//! Resolution is prefix-contiguous from the root of the dispatch tree: the
//! walk consumes one segment at a time and stops at the first segment with
//! no matching child. The deepest node along that walk that carries a worker
//! wins; the consumed segments become the request's resolved address and the
//! remaining segments form the payload.
//!
//! Unroutable messages complete without error and without invoking any
//! worker, so the broker deletes them rather than letting the queue retry a
//! message that can never match.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::broker::request::Request;
use crate::queue::QueueHandle;
use crate::utils::error::WorkerError;
use crate::workers::{Registry, WorkerFn};


/// How a routed message finished.
#[derive(Debug)]
pub enum RouteOutcome {
    /// No worker matched; the message is treated as handled.
    Unrouted,
    /// A worker ran to completion with this result.
    Completed(Result<(), WorkerError>),
}

/// Routes requests to workers looked up in the registry.
pub struct Router {
    registry: Arc<Registry>,
}

impl Router {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Resolve the request's address, decode its payload and invoke the
    /// matched worker.
    pub async fn route(&self, req: &mut Request, queue: QueueHandle) -> RouteOutcome {
        let Some(worker) = self.resolve(req) else {
            return RouteOutcome::Unrouted;
        };

        RouteOutcome::Completed(worker(req.clone(), queue).await)
    }

    /// Walk the dispatch tree along the message's segments, recording the
    /// deepest callable node, and fill in the request's address and data.
    fn resolve(&self, req: &mut Request) -> Option<WorkerFn> {
        let segments: Vec<&str> = req.message.split(':').collect();
        let tree = self.registry.workers();

        let mut node = &*tree;
        let mut matched: Option<(usize, WorkerFn)> = None;

        for (i, segment) in segments.iter().enumerate() {
            match node.child(segment) {
                Some(child) => {
                    if let Some(worker) = &child.worker {
                        matched = Some((i + 1, worker.clone()));
                    }
                    node = child;
                }
                None => break,
            }
        }

        let (depth, worker) = matched?;
        req.address = segments[..depth].iter().map(|s| s.to_string()).collect();
        req.data = Some(decode_payload(&segments[depth..].join(":")));

        Some(worker)
    }
}

/// Decode the payload portion of a message.
///
/// Only a payload wrapped exactly as `[[ ... ]]` is base64-decoded; anything
/// else passes through verbatim. This asymmetry distinguishes a plain text
/// payload from a structured encoded one. Decoded text that parses as JSON
/// becomes a structured value, otherwise the text itself is the data.
fn decode_payload(raw: &str) -> Value {
    let Some(inner) = raw
        .strip_prefix("[[")
        .and_then(|rest| rest.strip_suffix("]]"))
    else {
        return Value::String(raw.to_string());
    };

    match BASE64.decode(inner) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        // Malformed encapsulation falls back to the raw payload
        Err(_) => Value::String(raw.to_string()),
    }
}
