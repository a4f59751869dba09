//! The `broker` module owns the queue-poll event loop.
//!
//! On each inbound event it consults the throttle for admission, builds a
//! [`request::Request`], delegates to the router and interprets the worker's
//! result to decide acknowledgment, classifying failures through the error
//! taxonomy.

pub mod engine;
pub mod request;

pub use engine::{Broker, interpret};

#[cfg(test)]
mod tests;
