//! Canonical in-memory representation of trace spans.
//!
//! Every intake path of the collector normalizes incoming data into the
//! types in this crate before it is queued, sanitized, and written to
//! storage. All types are plain values: constructing, cloning, and
//! inspecting them has no side effects and performs no I/O.

mod id;
mod keyvalue;
mod span;

pub use id::{ParseIdError, SpanId, TraceId};
pub use keyvalue::{KeyValue, TagValue};
pub use span::{Flags, Log, Process, RefType, Span, SpanRef};

/// Service name assigned to spans whose producer did not report one.
pub const UNKNOWN_SERVICE_NAME: &str = "unknown-service";
