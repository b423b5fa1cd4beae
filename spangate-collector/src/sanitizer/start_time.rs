use spangate_model::Span;
use spangate_zipkin::zipkincore::{CLIENT_SEND, SERVER_RECV};
use tracing::debug;

use super::{event_timestamp, Sanitizer};

/// Derives a missing start time from the span's logs: the earliest
/// client-send or server-receive event, falling back to the earliest log
/// of any kind. A span with no logs is left untouched.
#[derive(Debug, Default)]
pub struct StartTimeSanitizer;

impl Sanitizer for StartTimeSanitizer {
    fn sanitize(&self, span: &mut Span) {
        if span.start_time != 0 {
            return;
        }
        let anchor = match (
            event_timestamp(span, CLIENT_SEND),
            event_timestamp(span, SERVER_RECV),
        ) {
            (Some(cs), Some(sr)) => Some(cs.min(sr)),
            (Some(cs), None) => Some(cs),
            (None, Some(sr)) => Some(sr),
            (None, None) => span.logs.iter().map(|log| log.timestamp).min(),
        };
        if let Some(start_time) = anchor {
            debug!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                start_time,
                "span start time derived from logs"
            );
            span.start_time = start_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spangate_model::{KeyValue, Log};

    fn span_with_logs(start_time: i64, events: &[(&str, i64)]) -> Span {
        Span {
            start_time,
            logs: events
                .iter()
                .map(|(value, timestamp)| Log {
                    timestamp: *timestamp,
                    fields: vec![KeyValue::string("event", *value)],
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn existing_start_time_is_untouched() {
        let mut span = span_with_logs(55, &[("cs", 10)]);
        StartTimeSanitizer.sanitize(&mut span);
        assert_eq!(span.start_time, 55);
    }

    #[test]
    fn earliest_core_event_wins() {
        let mut span = span_with_logs(0, &[("sr", 30), ("cs", 20), ("other", 5)]);
        StartTimeSanitizer.sanitize(&mut span);
        assert_eq!(span.start_time, 20);
    }

    #[test]
    fn any_log_is_the_fallback() {
        let mut span = span_with_logs(0, &[("retry", 40), ("other", 15)]);
        StartTimeSanitizer.sanitize(&mut span);
        assert_eq!(span.start_time, 15);
    }

    #[test]
    fn no_logs_leaves_zero() {
        let mut span = span_with_logs(0, &[]);
        StartTimeSanitizer.sanitize(&mut span);
        assert_eq!(span.start_time, 0);
    }
}
