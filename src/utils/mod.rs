//! # Utility Modules
//!
//! Supporting utilities for logging, metrics, and timing.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: Thread-safe per-engine counters
//! - **Time**: Injectable monotonic clock for peer bookkeeping

pub mod logging;
pub mod metrics;
pub mod time;
