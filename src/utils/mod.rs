//! # Utility Modules
//!
//! Supporting utilities for logging, randomness, timing and metrics.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Rng**: Per-call-site randomness for nonces, IVs and seeds
//! - **Timeout**: Async timeout wrappers
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - OS-seeded generators only (getrandom / `StdRng::from_os_rng`)
//! - No process-wide mutable seed

pub mod logging;
pub mod metrics;
pub mod rng;
pub mod timeout;

pub use metrics::global_metrics;
