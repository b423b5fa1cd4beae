use std::mem;

use crate::{KeyValue, SpanId, TagValue, TraceId};

/// Span flag word. Bit 0 marks debug spans, bit 1 sampled spans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(pub u32);

impl Flags {
    const DEBUG: u32 = 1;
    const SAMPLED: u32 = 2;

    /// Set the debug bit.
    pub fn set_debug(&mut self) {
        self.0 |= Self::DEBUG;
    }

    /// Whether the debug bit is set.
    pub fn is_debug(&self) -> bool {
        self.0 & Self::DEBUG == Self::DEBUG
    }

    /// Set the sampled bit.
    pub fn set_sampled(&mut self) {
        self.0 |= Self::SAMPLED;
    }

    /// Whether the sampled bit is set.
    pub fn is_sampled(&self) -> bool {
        self.0 & Self::SAMPLED == Self::SAMPLED
    }
}

/// How a [`SpanRef`] relates the referring span to the referenced one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefType {
    /// The referenced span is the parent and awaits this span's result.
    ChildOf,
    /// The referenced span does not depend on this span's result.
    FollowsFrom,
}

impl Default for RefType {
    fn default() -> Self {
        RefType::ChildOf
    }
}

/// A causal reference from one span to another.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRef {
    /// Trace containing the referenced span.
    pub trace_id: TraceId,
    /// The referenced span.
    pub span_id: SpanId,
    /// Relationship kind.
    pub ref_type: RefType,
}

/// A timestamped event recorded while a span was active.
#[derive(Clone, Debug, PartialEq)]
pub struct Log {
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    /// Event payload, ordering preserved as received.
    pub fields: Vec<KeyValue>,
}

/// The process that emitted a span: a service name plus process-level tags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Process {
    /// Name of the emitting service. Empty only transiently, before the
    /// service-name sanitizer has run.
    pub service_name: String,
    /// Process-level tags, ordering preserved as received.
    pub tags: Vec<KeyValue>,
}

impl Process {
    /// Create a process from a service name and tags.
    pub fn new(service_name: impl Into<String>, tags: Vec<KeyValue>) -> Self {
        Process {
            service_name: service_name.into(),
            tags,
        }
    }
}

/// A single canonical trace span.
///
/// Timestamps and durations are microseconds; zero means the producer did
/// not report the field and a sanitizer may derive it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    /// Trace this span belongs to.
    pub trace_id: TraceId,
    /// Identifier of this span, unique within the trace.
    pub span_id: SpanId,
    /// Identifier of the parent span; zero when the span is a root.
    pub parent_span_id: SpanId,
    /// Name of the operation this span represents.
    pub operation_name: String,
    /// Causal references to other spans.
    pub references: Vec<SpanRef>,
    /// Debug/sampled flag word.
    pub flags: Flags,
    /// Start of the operation, microseconds since the Unix epoch.
    pub start_time: i64,
    /// Length of the operation in microseconds.
    pub duration: i64,
    /// Span tags, ordering preserved as received.
    pub tags: Vec<KeyValue>,
    /// Timestamped events, ordering preserved as received.
    pub logs: Vec<Log>,
    /// The emitting process.
    pub process: Process,
}

impl Span {
    /// Look up a tag value by key. Returns the first match when the
    /// producer sent duplicates.
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| &kv.value)
    }

    /// Estimated in-memory footprint of the span in bytes.
    ///
    /// Counts inline struct sizes plus heap payloads of strings, byte
    /// buffers, and vectors. This is an estimate for capacity planning,
    /// not a serialized wire size.
    pub fn estimated_size(&self) -> usize {
        let mut size = mem::size_of::<Span>();
        size += self.operation_name.len();
        size += self.references.len() * mem::size_of::<SpanRef>();
        size += self.tags.iter().map(KeyValue::estimated_size).sum::<usize>();
        for log in &self.logs {
            size += mem::size_of::<Log>();
            size += log.fields.iter().map(KeyValue::estimated_size).sum::<usize>();
        }
        size += self.process.service_name.len();
        size += self
            .process
            .tags
            .iter()
            .map(KeyValue::estimated_size)
            .sum::<usize>();
        size
    }
}
