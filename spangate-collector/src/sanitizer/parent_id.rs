use spangate_model::{RefType, Span, SpanRef};
use tracing::warn;

use super::Sanitizer;

/// Reconciles the parent span id with the reference list: references to
/// other traces are dropped, and a parent id without a matching
/// reference gets a child-of reference injected at the head.
#[derive(Debug, Default)]
pub struct ParentIdSanitizer;

impl Sanitizer for ParentIdSanitizer {
    fn sanitize(&self, span: &mut Span) {
        let trace_id = span.trace_id;
        let before = span.references.len();
        span.references.retain(|r| r.trace_id == trace_id);
        if span.references.len() != before {
            warn!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                dropped = before - span.references.len(),
                "dropped references to other traces"
            );
        }

        if span.parent_span_id.is_zero() {
            return;
        }
        let parent_referenced = span
            .references
            .iter()
            .any(|r| r.span_id == span.parent_span_id);
        if !parent_referenced {
            span.references.insert(
                0,
                SpanRef {
                    trace_id,
                    span_id: span.parent_span_id,
                    ref_type: RefType::ChildOf,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spangate_model::{SpanId, TraceId};

    fn reference(trace: u64, span: u64) -> SpanRef {
        SpanRef {
            trace_id: TraceId::new(0, trace),
            span_id: SpanId(span),
            ref_type: RefType::FollowsFrom,
        }
    }

    #[test]
    fn injects_missing_parent_reference_at_head() {
        let mut span = Span {
            trace_id: TraceId::new(0, 1),
            parent_span_id: SpanId(9),
            references: vec![reference(1, 5)],
            ..Default::default()
        };
        ParentIdSanitizer.sanitize(&mut span);
        assert_eq!(span.references.len(), 2);
        assert_eq!(span.references[0].span_id, SpanId(9));
        assert_eq!(span.references[0].ref_type, RefType::ChildOf);
    }

    #[test]
    fn existing_parent_reference_is_kept_as_is() {
        let mut span = Span {
            trace_id: TraceId::new(0, 1),
            parent_span_id: SpanId(5),
            references: vec![reference(1, 5)],
            ..Default::default()
        };
        ParentIdSanitizer.sanitize(&mut span);
        assert_eq!(span.references.len(), 1);
        assert_eq!(span.references[0].ref_type, RefType::FollowsFrom);
    }

    #[test]
    fn cross_trace_references_are_dropped() {
        let mut span = Span {
            trace_id: TraceId::new(0, 1),
            references: vec![reference(2, 5), reference(1, 6)],
            ..Default::default()
        };
        ParentIdSanitizer.sanitize(&mut span);
        assert_eq!(span.references.len(), 1);
        assert_eq!(span.references[0].span_id, SpanId(6));
    }

    #[test]
    fn rootless_span_without_parent_is_untouched() {
        let mut span = Span {
            trace_id: TraceId::new(0, 1),
            ..Default::default()
        };
        ParentIdSanitizer.sanitize(&mut span);
        assert!(span.references.is_empty());
    }
}
