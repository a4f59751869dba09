//! # qbroker
//!
//! `qbroker` is a message-queue worker broker built with Rust. It polls an
//! external queue service for work items, applies admission control and
//! dispatches each message to an operator-supplied worker function resolved
//! through a hierarchical, colon-delimited address scheme.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: The event loop tying admission, routing and acknowledgment together.
//! - `throttle`: The concurrency gate and sliding-window rate limiter.
//! - `router`: Address resolution against the worker registry and payload decoding.
//! - `workers`: The hot-reloadable dispatch tree built from the worker source directory.
//! - `queue`: The narrow interface to the external queue service.
//! - `config`: Handles loading and managing broker configuration.
//! - `utils`: Contains shared utilities, such as the error taxonomy and logging.

pub mod broker;
pub mod config;
pub mod queue;
pub mod router;
pub mod throttle;
pub mod utils;
pub mod workers;
