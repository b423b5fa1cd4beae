use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use spangate_model::KeyValue;

use crate::filter::{accept_all, SpanFilter};

/// Initial queue capacity.
const SPANGATE_QUEUE_SIZE: &str = "SPANGATE_QUEUE_SIZE";
/// Default initial queue capacity.
const DEFAULT_QUEUE_SIZE: usize = 2_000;
/// Number of worker threads draining the queue.
const SPANGATE_NUM_WORKERS: &str = "SPANGATE_NUM_WORKERS";
/// Default number of worker threads.
const DEFAULT_NUM_WORKERS: usize = 50;
/// Default time the processor waits for the queue to drain on close.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Default interval between dynamic queue-size evaluations.
const DEFAULT_RESIZE_INTERVAL: Duration = Duration::from_secs(60);

/// Span processor configuration.
pub struct CollectorConfig {
    /// Initial capacity of the span queue. When the queue is full new
    /// spans are rejected, never blocked on.
    pub(crate) queue_size: usize,

    /// Number of worker threads draining the queue.
    pub(crate) num_workers: usize,

    /// Tags appended to every span's process tags before sanitization.
    /// A span's own tag wins on key collision.
    pub(crate) collector_tags: Vec<KeyValue>,

    /// Baseline for the dynamic queue-size bounds; defaults to the
    /// initial queue size.
    pub(crate) dyn_queue_size_warmup: usize,

    /// Memory budget in bytes for dynamic queue sizing. Zero disables
    /// resizing, and is the default.
    pub(crate) dyn_queue_size_memory: usize,

    /// Predicate applied to every span after sanitization; the default
    /// accepts everything.
    pub(crate) span_filter: SpanFilter,

    /// How long `close` waits for queued spans to drain before dropping
    /// the remainder.
    pub(crate) shutdown_timeout: Duration,

    /// How often the dynamic-sizing thread re-evaluates the capacity.
    pub(crate) resize_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let mut config = CollectorConfig {
            queue_size: DEFAULT_QUEUE_SIZE,
            num_workers: DEFAULT_NUM_WORKERS,
            collector_tags: Vec::new(),
            dyn_queue_size_warmup: DEFAULT_QUEUE_SIZE,
            dyn_queue_size_memory: 0,
            span_filter: accept_all(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            resize_interval: DEFAULT_RESIZE_INTERVAL,
        };

        if let Some(queue_size) = env::var(SPANGATE_QUEUE_SIZE)
            .ok()
            .and_then(|queue_size| usize::from_str(&queue_size).ok())
        {
            config.queue_size = queue_size;
            config.dyn_queue_size_warmup = queue_size;
        }

        if let Some(num_workers) = env::var(SPANGATE_NUM_WORKERS)
            .ok()
            .and_then(|num_workers| usize::from_str(&num_workers).ok())
        {
            config.num_workers = num_workers;
        }

        config
    }
}

impl CollectorConfig {
    /// Set the initial queue capacity. Also moves the dynamic-sizing
    /// warmup baseline unless one was set explicitly.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        if self.dyn_queue_size_warmup == self.queue_size {
            self.dyn_queue_size_warmup = queue_size;
        }
        self.queue_size = queue_size;
        self
    }

    /// Set the number of worker threads draining the queue.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set tags appended to every span's process tags. A span's own tag
    /// wins on key collision.
    pub fn with_collector_tags(mut self, collector_tags: Vec<KeyValue>) -> Self {
        self.collector_tags = collector_tags;
        self
    }

    /// Set the baseline for dynamic queue-size bounds.
    pub fn with_dyn_queue_size_warmup(mut self, warmup: usize) -> Self {
        self.dyn_queue_size_warmup = warmup;
        self
    }

    /// Set the memory budget in bytes for dynamic queue sizing. Zero
    /// disables resizing.
    pub fn with_dyn_queue_size_memory(mut self, memory: usize) -> Self {
        self.dyn_queue_size_memory = memory;
        self
    }

    /// Set the span filter predicate.
    pub fn with_span_filter(mut self, span_filter: SpanFilter) -> Self {
        self.span_filter = span_filter;
        self
    }

    /// Set how long `close` waits for queued spans to drain.
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Set how often dynamic sizing re-evaluates the capacity.
    pub fn with_resize_interval(mut self, resize_interval: Duration) -> Self {
        self.resize_interval = resize_interval;
        self
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("queue_size", &self.queue_size)
            .field("num_workers", &self.num_workers)
            .field("collector_tags", &self.collector_tags)
            .field("dyn_queue_size_warmup", &self.dyn_queue_size_warmup)
            .field("dyn_queue_size_memory", &self.dyn_queue_size_memory)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("resize_interval", &self.resize_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_apply() {
        let config = CollectorConfig::default()
            .with_queue_size(10)
            .with_num_workers(2)
            .with_dyn_queue_size_memory(1 << 20)
            .with_shutdown_timeout(Duration::from_millis(100));
        assert_eq!(config.queue_size, 10);
        assert_eq!(config.dyn_queue_size_warmup, 10);
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.dyn_queue_size_memory, 1 << 20);
        assert_eq!(config.shutdown_timeout, Duration::from_millis(100));
    }

    #[test]
    fn explicit_warmup_survives_queue_size_changes() {
        let config = CollectorConfig::default()
            .with_dyn_queue_size_warmup(500)
            .with_queue_size(10);
        assert_eq!(config.dyn_queue_size_warmup, 500);
        assert_eq!(config.queue_size, 10);
    }
}
