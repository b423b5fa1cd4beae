//! The storage-writer seam between the pipeline and durable stores.

use std::fmt::Debug;

use async_trait::async_trait;
use spangate_model::Span;
use thiserror::Error;

/// Errors surfaced by span writers.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The writer has been shut down and accepts no further spans.
    #[error("writer is shut down")]
    AlreadyShutdown,
    /// The backing store rejected or failed the write. The message is
    /// for operator logs; workers count the failure and move on.
    #[error("{0}")]
    Failure(String),
}

/// `SpanWriter` is the narrow interface durable stores implement to
/// receive spans from the pipeline.
///
/// Writers take ownership of the span on success; the pipeline never
/// reads it afterwards. Calls arrive concurrently from every worker, so
/// implementations must tolerate concurrent invocation. Any retry logic
/// is the writer's responsibility; the pipeline performs none.
#[async_trait]
pub trait SpanWriter: Debug + Send + Sync {
    /// Persist one span.
    async fn write_span(&self, span: Span) -> Result<(), WriteError>;
}
