use spangate_model::{KeyValue, Span, TagValue};
use tracing::warn;

use super::Sanitizer;

/// Tag key instrumentations use to mark failed spans.
const ERROR_TAG: &str = "error";
/// Tag key preserving a textual error value after coercion.
const ERROR_MESSAGE_TAG: &str = "error.message";

/// Normalizes the `error` tag to a boolean: truthy strings and numbers
/// coerce to `true`, a textual value is preserved under `error.message`,
/// and duplicate `error` tags collapse to the first occurrence.
#[derive(Debug, Default)]
pub struct ErrorTagSanitizer;

impl Sanitizer for ErrorTagSanitizer {
    fn sanitize(&self, span: &mut Span) {
        let Some(first) = span.tags.iter().position(|kv| kv.key == ERROR_TAG) else {
            return;
        };

        let mut kept_first = false;
        let before = span.tags.len();
        span.tags.retain(|kv| {
            if kv.key != ERROR_TAG {
                return true;
            }
            if kept_first {
                false
            } else {
                kept_first = true;
                true
            }
        });
        if span.tags.len() != before {
            warn!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                removed = before - span.tags.len(),
                "removed duplicate error tags"
            );
        }

        // Duplicates sit after the first occurrence, so its index is
        // unchanged by the retain above.
        let mut message = None;
        let error_tag = &mut span.tags[first];
        let coerced = match &error_tag.value {
            TagValue::Bool(truthy) => TagValue::Bool(*truthy),
            TagValue::String(text) => {
                if !text.is_empty() {
                    message = Some(text.clone());
                }
                TagValue::Bool(!text.is_empty())
            }
            TagValue::Int64(number) => TagValue::Bool(*number != 0),
            TagValue::Float64(number) => TagValue::Bool(*number != 0.0),
            TagValue::Binary(bytes) => TagValue::Bool(!bytes.is_empty()),
        };
        error_tag.value = coerced;
        if let Some(message) = message {
            span.tags.push(KeyValue::string(ERROR_MESSAGE_TAG, message));
        }
    }
}
