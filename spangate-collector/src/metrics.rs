//! Metric names emitted by the pipeline.
//!
//! Service- and host-tagged counters are labeled at the emission site;
//! emission is fire-and-forget through the `metrics` facade and never
//! fails the pipeline.

/// Spans offered to the queue, labeled by service and wire format.
pub(crate) const SPANS_RECEIVED: &str = "spans.received";
/// Spans refused because the queue was full, labeled by service and format.
pub(crate) const SPANS_REJECTED: &str = "spans.rejected";
/// Spans written successfully, labeled by service.
pub(crate) const SPANS_SAVED_BY_SVC: &str = "spans.saved_by_svc";
/// Spans written successfully, labeled by collector hostname.
pub(crate) const SPANS_SAVED_BY_HOST: &str = "spans.saved_by_host";
/// Spans refused by the filter predicate, labeled by service.
pub(crate) const SPANS_DROPPED_BY_FILTER: &str = "spans.dropped_by_filter";
/// Spans the writer failed to persist, labeled by service.
pub(crate) const SPANS_WRITE_FAILED: &str = "spans.write_failed";
/// Spans discarded because shutdown hit its deadline.
pub(crate) const SPANS_DROPPED: &str = "spans.dropped";
/// Queue occupancy, sampled at dequeue.
pub(crate) const QUEUE_LENGTH: &str = "queue.length";
/// Queue capacity, emitted at startup and on resize.
pub(crate) const QUEUE_CAPACITY: &str = "queue.capacity";
/// Microseconds between enqueue and dequeue.
pub(crate) const IN_QUEUE_LATENCY: &str = "in_queue_latency";
/// Span count per accepted batch, labeled by format.
pub(crate) const BATCH_SIZE: &str = "batch.size";
