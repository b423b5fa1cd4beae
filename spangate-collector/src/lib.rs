//! The spangate collector core: multi-protocol span intake feeding a
//! bounded queue drained by a worker pool into a pluggable store.
//!
//! ```ascii
//!   +-----------------+   +---------------------+   +---------------+
//!   | ZipkinHandler   |   |                     |   |               |
//!   | JaegerHandler   +---> SpanProcessor       +--->  SpanWriter   |
//!   | (HTTP intake)   |   | (queue + workers)   |   |  (storage)    |
//!   +-----------------+   +---------------------+   +---------------+
//!                            | sanitize | filter |
//! ```
//!
//! Intake acknowledges with 202 once a batch decodes and is offered to
//! the queue; persistence is the writer's contract. Enqueueing never
//! blocks a producer: when the queue is full the span is rejected and
//! counted. Workers sanitize, filter, and write independently — spans
//! from one request keep their order only through a single worker.

mod config;
mod filter;
mod handler;
mod metrics;
mod processor;
mod queue;
pub mod sanitizer;
mod server;
pub mod testing;
mod writer;

pub use config::CollectorConfig;
pub use filter::{accept_all, SpanFilter};
pub use handler::{JaegerHandler, ZipkinHandler};
pub use processor::{SpanOrigin, SpanProcessor};
pub use server::{IntakeServer, ServeError, ServerConfig};
pub use writer::{SpanWriter, WriteError};
