use std::sync::Arc;

use spangate_model::Span;

/// Predicate consulted for every span after sanitization and before the
/// write. Returning `false` drops the span. Filters must not mutate the
/// span and must not block; they run inline on every worker.
pub type SpanFilter = Arc<dyn Fn(&Span) -> bool + Send + Sync>;

/// The default filter: accepts every span.
pub fn accept_all() -> SpanFilter {
    Arc::new(|_| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_accepts() {
        let filter = accept_all();
        assert!(filter(&Span::default()));
    }
}
