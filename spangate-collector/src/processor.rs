//! The span processor: a bounded queue drained by a worker-thread pool.
//!
//! Intake handlers enqueue canonical spans without blocking; workers
//! dequeue, sanitize, filter, and hand spans to the storage writer.
//! The queue is the only mutable state shared between intake and the
//! workers.

use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use spangate_model::{KeyValue, Span};
use tracing::{info, warn};

use crate::config::CollectorConfig;
use crate::filter::SpanFilter;
use crate::metrics::{
    IN_QUEUE_LATENCY, QUEUE_CAPACITY, QUEUE_LENGTH, SPANS_DROPPED, SPANS_RECEIVED,
    SPANS_SAVED_BY_HOST, SPANS_SAVED_BY_SVC, SPANS_WRITE_FAILED, SPANS_DROPPED_BY_FILTER,
};
use crate::queue::BoundedQueue;
use crate::sanitizer::SanitizerChain;
use crate::writer::SpanWriter;

/// Which intake path produced a span; carried for metric labels only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanOrigin {
    /// Zipkin v1 Thrift or JSON.
    ZipkinV1,
    /// Zipkin v2 JSON or Protobuf.
    ZipkinV2,
    /// Native Jaeger Thrift batch.
    Jaeger,
}

impl SpanOrigin {
    pub(crate) fn as_label(self) -> &'static str {
        match self {
            SpanOrigin::ZipkinV1 => "zipkin-v1",
            SpanOrigin::ZipkinV2 => "zipkin-v2",
            SpanOrigin::Jaeger => "jaeger",
        }
    }
}

// Queue entry: the span plus its enqueue instant for latency metrics.
// Timing never touches the canonical span type.
struct QueuedSpan {
    span: Span,
    enqueued_at: Instant,
}

// Running totals of accepted span sizes, feeding dynamic queue sizing.
#[derive(Debug, Default)]
struct SizeWindow {
    bytes: AtomicU64,
    spans: AtomicU64,
}

impl SizeWindow {
    fn record(&self, size: usize) {
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
        self.spans.fetch_add(1, Ordering::Relaxed);
    }

    fn take(&self) -> (u64, u64) {
        (
            self.bytes.swap(0, Ordering::Relaxed),
            self.spans.swap(0, Ordering::Relaxed),
        )
    }
}

struct WorkerContext {
    queue: Arc<BoundedQueue<QueuedSpan>>,
    chain: SanitizerChain,
    filter: SpanFilter,
    writer: Arc<dyn SpanWriter>,
    collector_tags: Vec<KeyValue>,
    hostname: String,
}

/// The bounded-queue + worker-pool pipeline between intake and storage.
pub struct SpanProcessor {
    queue: Arc<BoundedQueue<QueuedSpan>>,
    window: Arc<SizeWindow>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    resizer: Mutex<Option<thread::JoinHandle<()>>>,
    resizer_stop: Mutex<Option<mpsc::Sender<()>>>,
    closed: AtomicBool,
    shutdown_timeout: std::time::Duration,
}

impl std::fmt::Debug for SpanProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanProcessor")
            .field("queue_len", &self.queue.len())
            .field("queue_capacity", &self.queue.capacity())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl SpanProcessor {
    /// Build a processor and start its workers.
    pub fn new(config: CollectorConfig, writer: Arc<dyn SpanWriter>) -> Self {
        Self::with_sanitizers(config, SanitizerChain::standard(), writer)
    }

    /// Build a processor with a custom sanitizer chain.
    pub fn with_sanitizers(
        config: CollectorConfig,
        chain: SanitizerChain,
        writer: Arc<dyn SpanWriter>,
    ) -> Self {
        let queue = Arc::new(BoundedQueue::with_capacity(config.queue_size));
        gauge!(QUEUE_CAPACITY).set(config.queue_size as f64);

        let context = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            chain,
            filter: config.span_filter,
            writer,
            collector_tags: config.collector_tags,
            hostname: local_hostname(),
        });

        let mut workers = Vec::with_capacity(config.num_workers);
        for index in 0..config.num_workers {
            let context = Arc::clone(&context);
            let handle = thread::Builder::new()
                .name(format!("spangate-worker-{index}"))
                .spawn(move || worker_loop(&context));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(error) => warn!(%error, index, "failed to spawn worker thread"),
            }
        }

        let window = Arc::new(SizeWindow::default());
        let (resizer, resizer_stop) = if config.dyn_queue_size_memory > 0 {
            let (stop_tx, stop_rx) = mpsc::channel();
            let resizer = Resizer {
                queue: Arc::clone(&queue),
                window: Arc::clone(&window),
                memory: config.dyn_queue_size_memory as u64,
                warmup: config.dyn_queue_size_warmup.max(1),
                interval: config.resize_interval,
            };
            let handle = thread::Builder::new()
                .name("spangate-queue-resizer".to_owned())
                .spawn(move || resizer.run(&stop_rx));
            match handle {
                Ok(handle) => (Some(handle), Some(stop_tx)),
                Err(error) => {
                    warn!(%error, "failed to spawn queue resizer thread");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        SpanProcessor {
            queue,
            window,
            workers: Mutex::new(workers),
            resizer: Mutex::new(resizer),
            resizer_stop: Mutex::new(resizer_stop),
            closed: AtomicBool::new(false),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Offer a span to the queue without blocking. Returns `false` when
    /// the queue is full or the processor is closed; the caller is
    /// responsible for rejection accounting.
    pub fn enqueue(&self, span: Span, origin: SpanOrigin) -> bool {
        counter!(
            SPANS_RECEIVED,
            "service" => span.process.service_name.clone(),
            "format" => origin.as_label()
        )
        .increment(1);
        let size = span.estimated_size();
        let accepted = self
            .queue
            .try_push(QueuedSpan {
                span,
                enqueued_at: Instant::now(),
            })
            .is_ok();
        if accepted {
            self.window.record(size);
        }
        accepted
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the queue, wait up to the shutdown timeout for workers to
    /// drain it, and drop whatever remains. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.close();
        if !self.queue.wait_drained(self.shutdown_timeout) {
            let dropped = self.queue.clear();
            if dropped > 0 {
                warn!(dropped, "spans dropped at shutdown deadline");
                counter!(SPANS_DROPPED).increment(dropped as u64);
            }
        }

        // Dropping the stop channel ends the resizer's timed receive.
        self.resizer_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(resizer) = self
            .resizer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = resizer.join();
        }

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            let _ = worker.join();
        }
        info!("span processor closed");
    }
}

impl Drop for SpanProcessor {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(context: &WorkerContext) {
    while let Some(queued) = context.queue.pop() {
        gauge!(QUEUE_LENGTH).set(context.queue.len() as f64);
        histogram!(IN_QUEUE_LATENCY).record(queued.enqueued_at.elapsed().as_micros() as f64);

        let mut span = queued.span;
        append_collector_tags(&mut span, &context.collector_tags);
        context.chain.sanitize(&mut span);

        if !(context.filter)(&span) {
            counter!(
                SPANS_DROPPED_BY_FILTER,
                "service" => span.process.service_name.clone()
            )
            .increment(1);
            continue;
        }

        let service = span.process.service_name.clone();
        match futures_executor::block_on(context.writer.write_span(span)) {
            Ok(()) => {
                counter!(SPANS_SAVED_BY_SVC, "service" => service).increment(1);
                counter!(SPANS_SAVED_BY_HOST, "host" => context.hostname.clone()).increment(1);
            }
            Err(error) => {
                warn!(%error, service = %service, "failed to write span");
                counter!(SPANS_WRITE_FAILED, "service" => service).increment(1);
            }
        }
    }
}

// The span's own tag wins on key collision.
fn append_collector_tags(span: &mut Span, collector_tags: &[KeyValue]) {
    for tag in collector_tags {
        if !span.process.tags.iter().any(|existing| existing.key == tag.key) {
            span.process.tags.push(tag.clone());
        }
    }
}

struct Resizer {
    queue: Arc<BoundedQueue<QueuedSpan>>,
    window: Arc<SizeWindow>,
    memory: u64,
    warmup: usize,
    interval: std::time::Duration,
}

impl Resizer {
    fn run(&self, stop: &mpsc::Receiver<()>) {
        loop {
            match stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => self.evaluate(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    // Retarget capacity to the memory budget divided by the mean span
    // size observed since the last evaluation, clamped around the warmup
    // baseline. Small movements are ignored.
    fn evaluate(&self) {
        let (bytes, spans) = self.window.take();
        if spans == 0 || bytes == 0 {
            return;
        }
        let mean = (bytes / spans).max(1);
        let target = (self.memory / mean) as usize;
        let target = target.clamp(self.warmup / 2, self.warmup.saturating_mul(100));
        let current = self.queue.capacity();
        if current == 0 {
            return;
        }
        let change = current.abs_diff(target);
        if change * 5 <= current {
            return;
        }
        info!(current, target, mean, "resizing span queue");
        self.queue.resize(target);
        gauge!(QUEUE_CAPACITY).set(target as f64);
    }
}

fn local_hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .filter(|hostname| !hostname.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .ok()
                .map(|hostname| hostname.trim().to_owned())
        })
        .filter(|hostname| !hostname.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}
