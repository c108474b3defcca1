//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, request id span from tower-http)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via the fmt layer (logging.rs)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Token contents never appear in logs; only the failure kind does
//! - Request ID flows through all subsystems via the trace span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
