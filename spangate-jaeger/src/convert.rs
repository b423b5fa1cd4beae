//! Conversion of Jaeger Thrift batches into canonical spans.

use spangate_model::{
    Flags, KeyValue, Log, Process, RefType, Span, SpanId, SpanRef, TraceId,
};

use crate::model;

/// Convert a batch into canonical spans, stamping the batch process onto
/// every span.
pub fn batch_to_canonical(batch: &model::Batch) -> Vec<Span> {
    let process = Process::new(
        batch.process.service_name.clone(),
        batch.process.tags.iter().map(tag_to_keyvalue).collect(),
    );
    batch
        .spans
        .iter()
        .map(|span| span_to_canonical(span, process.clone()))
        .collect()
}

fn span_to_canonical(span: &model::Span, process: Process) -> Span {
    Span {
        trace_id: TraceId::new(span.trace_id_high as u64, span.trace_id_low as u64),
        span_id: SpanId(span.span_id as u64),
        parent_span_id: SpanId(span.parent_span_id as u64),
        operation_name: span.operation_name.clone(),
        references: span.references.iter().map(ref_to_canonical).collect(),
        flags: Flags(span.flags as u32),
        start_time: span.start_time,
        duration: span.duration,
        tags: span.tags.iter().map(tag_to_keyvalue).collect(),
        logs: span
            .logs
            .iter()
            .map(|log| Log {
                timestamp: log.timestamp,
                fields: log.fields.iter().map(tag_to_keyvalue).collect(),
            })
            .collect(),
        process,
    }
}

fn ref_to_canonical(span_ref: &model::SpanRef) -> SpanRef {
    SpanRef {
        trace_id: TraceId::new(span_ref.trace_id_high as u64, span_ref.trace_id_low as u64),
        span_id: SpanId(span_ref.span_id as u64),
        ref_type: match span_ref.ref_type {
            model::SpanRefType::ChildOf => RefType::ChildOf,
            model::SpanRefType::FollowsFrom => RefType::FollowsFrom,
        },
    }
}

fn tag_to_keyvalue(tag: &model::Tag) -> KeyValue {
    match tag.v_type {
        model::TagType::String => {
            KeyValue::string(tag.key.clone(), tag.v_str.clone().unwrap_or_default())
        }
        model::TagType::Double => {
            KeyValue::float64(tag.key.clone(), tag.v_double.unwrap_or_default())
        }
        model::TagType::Bool => KeyValue::bool(tag.key.clone(), tag.v_bool.unwrap_or_default()),
        model::TagType::Long => KeyValue::int64(tag.key.clone(), tag.v_long.unwrap_or_default()),
        model::TagType::Binary => {
            KeyValue::binary(tag.key.clone(), tag.v_binary.clone().unwrap_or_default())
        }
    }
}
