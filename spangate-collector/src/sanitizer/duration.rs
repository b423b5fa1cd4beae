use spangate_model::Span;
use spangate_zipkin::zipkincore::{CLIENT_RECV, CLIENT_SEND, SERVER_RECV, SERVER_SEND};
use tracing::warn;

use super::{event_timestamp, Sanitizer};

/// Repairs span durations: negative values reset to zero, and a zero
/// duration is recovered from a client or server send/receive log pair
/// when one exists. Never produces a negative duration.
#[derive(Debug, Default)]
pub struct DurationSanitizer;

impl Sanitizer for DurationSanitizer {
    fn sanitize(&self, span: &mut Span) {
        if span.duration < 0 {
            warn!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                duration = span.duration,
                "negative span duration reset to zero"
            );
            span.duration = 0;
        }
        if span.duration == 0 {
            if let Some(recovered) = duration_from_logs(span) {
                span.duration = recovered;
            }
        }
    }
}

// The client pair wins when both are present.
fn duration_from_logs(span: &Span) -> Option<i64> {
    if let (Some(send), Some(recv)) = (
        event_timestamp(span, CLIENT_SEND),
        event_timestamp(span, CLIENT_RECV),
    ) {
        return Some((recv - send).max(0));
    }
    if let (Some(recv), Some(send)) = (
        event_timestamp(span, SERVER_RECV),
        event_timestamp(span, SERVER_SEND),
    ) {
        return Some((send - recv).max(0));
    }
    None
}
