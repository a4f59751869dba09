//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `qbroker` application.
//!
//! This module centralizes the queue error taxonomy and the logging setup,
//! so the broker has a single surface for classifying and reporting failures.

pub mod error;
pub mod logging;
