//! Repairs applied to every span between dequeue and the filter.
//!
//! A sanitizer fixes a malformed span in place and never drops it. The
//! chain order is contractual: later sanitizers rely on the invariants
//! earlier ones establish (the start-time fallback, for example, must
//! see durations the duration sanitizer has already repaired). Applying
//! the chain twice is equivalent to applying it once.

use std::fmt::Debug;

use spangate_model::Span;

mod duration;
mod error_tag;
mod parent_id;
mod service_name;
mod start_time;

pub use duration::DurationSanitizer;
pub use error_tag::ErrorTagSanitizer;
pub use parent_id::ParentIdSanitizer;
pub use service_name::ServiceNameSanitizer;
pub use start_time::StartTimeSanitizer;

/// A single in-place span repair.
pub trait Sanitizer: Debug + Send + Sync {
    /// Repair the span. Must not drop it and must be idempotent.
    fn sanitize(&self, span: &mut Span);
}

/// An ordered chain of sanitizers applied to every span.
#[derive(Debug, Default)]
pub struct SanitizerChain {
    sanitizers: Vec<Box<dyn Sanitizer>>,
}

impl SanitizerChain {
    /// A chain with the given sanitizers, applied in order.
    pub fn new(sanitizers: Vec<Box<dyn Sanitizer>>) -> Self {
        SanitizerChain { sanitizers }
    }

    /// The standard chain: duration, start-time, parent-id, error-tag,
    /// service-name.
    pub fn standard() -> Self {
        SanitizerChain::new(vec![
            Box::new(DurationSanitizer),
            Box::new(StartTimeSanitizer),
            Box::new(ParentIdSanitizer),
            Box::new(ErrorTagSanitizer),
            Box::new(ServiceNameSanitizer),
        ])
    }

    /// Apply every sanitizer to the span, in order.
    pub fn sanitize(&self, span: &mut Span) {
        for sanitizer in &self.sanitizers {
            sanitizer.sanitize(span);
        }
    }
}

// Shared by the duration and start-time sanitizers: the timestamp of the
// first log whose single `event` field equals `value`.
pub(crate) fn event_timestamp(span: &Span, value: &str) -> Option<i64> {
    span.logs
        .iter()
        .find(|log| {
            log.fields.iter().any(|field| {
                field.key == spangate_zipkin::EVENT_LOG_FIELD
                    && matches!(&field.value, spangate_model::TagValue::String(s) if s == value)
            })
        })
        .map(|log| log.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spangate_model::{KeyValue, Log, SpanId, SpanRef, TraceId};

    fn event_log(value: &str, timestamp: i64) -> Log {
        Log {
            timestamp,
            fields: vec![KeyValue::string("event", value)],
        }
    }

    #[test]
    fn chain_applies_in_order_and_is_idempotent() {
        let mut span = Span {
            trace_id: TraceId::new(0, 1),
            span_id: SpanId(2),
            parent_span_id: SpanId(3),
            duration: -5,
            start_time: 0,
            logs: vec![event_log("cs", 100), event_log("cr", 180)],
            tags: vec![KeyValue::string("error", "boom")],
            ..Default::default()
        };

        let chain = SanitizerChain::standard();
        chain.sanitize(&mut span);

        // Negative duration repaired, then recovered from the cs/cr pair.
        assert_eq!(span.duration, 80);
        // Start time recovered from the cs log.
        assert_eq!(span.start_time, 100);
        // Parent reference injected at the head.
        assert_eq!(
            span.references[0],
            SpanRef {
                trace_id: TraceId::new(0, 1),
                span_id: SpanId(3),
                ref_type: spangate_model::RefType::ChildOf,
            }
        );
        // Error tag coerced, original preserved.
        assert_eq!(
            span.tag("error"),
            Some(&spangate_model::TagValue::Bool(true))
        );
        // Empty service name replaced.
        assert_eq!(
            span.process.service_name,
            spangate_model::UNKNOWN_SERVICE_NAME
        );

        let once = span.clone();
        chain.sanitize(&mut span);
        assert_eq!(span, once);
    }
}
