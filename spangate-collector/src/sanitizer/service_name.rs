use spangate_model::{Span, UNKNOWN_SERVICE_NAME};
use tracing::warn;

use super::Sanitizer;

/// Replaces an empty service name with the unknown-service placeholder.
/// Zipkin-translated spans already carry one; this covers native spans
/// whose reporter sent an empty process.
#[derive(Debug, Default)]
pub struct ServiceNameSanitizer;

impl Sanitizer for ServiceNameSanitizer {
    fn sanitize(&self, span: &mut Span) {
        if span.process.service_name.is_empty() {
            warn!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                "span arrived without a service name"
            );
            span.process.service_name = UNKNOWN_SERVICE_NAME.to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_replaced() {
        let mut span = Span::default();
        ServiceNameSanitizer.sanitize(&mut span);
        assert_eq!(span.process.service_name, UNKNOWN_SERVICE_NAME);
    }

    #[test]
    fn existing_name_is_kept() {
        let mut span = Span::default();
        span.process.service_name = "checkout".to_owned();
        ServiceNameSanitizer.sanitize(&mut span);
        assert_eq!(span.process.service_name, "checkout");
    }
}
