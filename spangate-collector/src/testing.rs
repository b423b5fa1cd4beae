//! In-memory writers for tests and examples.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use spangate_model::Span;

use crate::writer::{SpanWriter, WriteError};

/// A writer that stores spans in memory for later inspection.
///
/// Cloning shares the underlying buffer, so a test can keep one handle
/// and hand the other to the processor.
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanWriter {
    spans: Arc<Mutex<Vec<Span>>>,
}

impl InMemorySpanWriter {
    /// A new, empty writer.
    pub fn new() -> Self {
        InMemorySpanWriter::default()
    }

    /// Snapshot of every span written so far.
    pub fn written_spans(&self) -> Vec<Span> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of spans written so far.
    pub fn len(&self) -> usize {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard every stored span.
    pub fn reset(&self) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl SpanWriter for InMemorySpanWriter {
    async fn write_span(&self, span: Span) -> Result<(), WriteError> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
        Ok(())
    }
}

/// A writer that discards every span.
#[derive(Clone, Debug, Default)]
pub struct NoopSpanWriter;

#[async_trait]
impl SpanWriter for NoopSpanWriter {
    async fn write_span(&self, _span: Span) -> Result<(), WriteError> {
        Ok(())
    }
}

/// A writer that fails every span, for exercising error accounting.
#[derive(Clone, Debug, Default)]
pub struct FailingSpanWriter;

#[async_trait]
impl SpanWriter for FailingSpanWriter {
    async fn write_span(&self, _span: Span) -> Result<(), WriteError> {
        Err(WriteError::Failure("storage unavailable".to_owned()))
    }
}
