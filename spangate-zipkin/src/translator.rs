//! Translation between the v1 in-memory model and canonical spans.

use spangate_model::{
    Flags, KeyValue, Log, Process, Span, SpanId, TagValue, TraceId, UNKNOWN_SERVICE_NAME,
};

use crate::endpoint;
use crate::zipkincore::{
    self, is_core_annotation, Annotation, AnnotationType, BinaryAnnotation, Endpoint, CLIENT_ADDR,
    CLIENT_RECV, CLIENT_SEND, LOCAL_COMPONENT, MESSAGE_ADDR, MESSAGE_RECV, MESSAGE_SEND,
    SERVER_ADDR, SERVER_RECV, SERVER_SEND,
};

/// Span tag carrying the client/server/producer/consumer role.
pub const SPAN_KIND_TAG: &str = "span.kind";
/// Span tag carrying the local component name.
pub const COMPONENT_TAG: &str = "component";
/// Span tag naming the remote peer's service.
pub const PEER_SERVICE_TAG: &str = "peer.service";
/// Span tag carrying the remote peer's packed IPv4 address.
pub const PEER_IPV4_TAG: &str = "peer.ipv4";
/// Span tag carrying the remote peer's raw IPv6 address.
pub const PEER_IPV6_TAG: &str = "peer.ipv6";
/// Span tag carrying the remote peer's port.
pub const PEER_PORT_TAG: &str = "peer.port";
/// Process tag carrying the emitting host's packed IPv4 address.
pub const PROCESS_IP_TAG: &str = "ip";
/// Log field key for plain annotation values.
pub const EVENT_LOG_FIELD: &str = "event";

/// Converts v1 spans into canonical spans.
///
/// The conversion is pure: the translator holds configuration only and
/// never mutates its input.
#[derive(Clone, Debug, Default)]
pub struct Translator {
    legacy_core_annotations: bool,
}

impl Translator {
    /// A translator with default behavior.
    pub fn new() -> Self {
        Translator::default()
    }

    /// Also treat annotation values beginning with `haproxy.` as
    /// core-like during service-name inference. Off by default;
    /// matches instrumentation that predates the v2 format.
    pub fn with_legacy_core_annotations(mut self, enabled: bool) -> Self {
        self.legacy_core_annotations = enabled;
        self
    }

    /// Convert a batch of v1 spans.
    pub fn to_canonical(&self, spans: &[zipkincore::Span]) -> Vec<Span> {
        spans.iter().map(|span| self.span_to_canonical(span)).collect()
    }

    fn span_to_canonical(&self, z: &zipkincore::Span) -> Span {
        let mut tags = Vec::new();
        if let Some(kind) = kind_tag(&z.annotations) {
            tags.push(kind);
        }

        // Every annotation is kept as a log so the original event
        // timeline survives translation; the core values additionally
        // drive the kind tag above and service inference below.
        let logs = z
            .annotations
            .iter()
            .map(|a| Log {
                timestamp: a.timestamp,
                fields: vec![KeyValue::string(EVENT_LOG_FIELD, a.value.clone())],
            })
            .collect();

        for ba in &z.binary_annotations {
            match ba.key.as_str() {
                CLIENT_ADDR | SERVER_ADDR | MESSAGE_ADDR
                    if ba.annotation_type == AnnotationType::Bool =>
                {
                    if let Some(host) = &ba.host {
                        tags.extend(peer_tags(host));
                    }
                }
                LOCAL_COMPONENT if ba.annotation_type == AnnotationType::String => {
                    let component = String::from_utf8_lossy(&ba.value);
                    if !component.is_empty() {
                        tags.push(KeyValue::string(COMPONENT_TAG, component.into_owned()));
                    }
                }
                _ => tags.push(typed_tag(ba)),
            }
        }

        let (service_name, host) = self.infer_service(z);
        let mut process_tags = Vec::new();
        if let Some(host) = host {
            if host.ipv4 != 0 {
                process_tags.push(KeyValue::int64(PROCESS_IP_TAG, i64::from(host.ipv4 as u32)));
            }
        }

        let mut flags = Flags::default();
        if z.debug {
            flags.set_debug();
        }

        Span {
            trace_id: TraceId::new(z.trace_id_high as u64, z.trace_id as u64),
            span_id: SpanId(z.id as u64),
            parent_span_id: SpanId(z.parent_id.unwrap_or(0) as u64),
            operation_name: z.name.clone(),
            references: Vec::new(),
            flags,
            start_time: z.timestamp.unwrap_or(0),
            duration: z.duration.unwrap_or(0),
            tags,
            logs,
            process: Process::new(service_name, process_tags),
        }
    }

    // First core annotation with a named host wins; binary-annotation
    // hosts are the fallback, unknown-service the last resort.
    fn infer_service<'a>(&self, z: &'a zipkincore::Span) -> (String, Option<&'a Endpoint>) {
        for annotation in &z.annotations {
            if let Some(host) = &annotation.host {
                let core_like = is_core_annotation(&annotation.value)
                    || (self.legacy_core_annotations && annotation.value.starts_with("haproxy."));
                if core_like && !host.service_name.is_empty() {
                    return (host.service_name.clone(), Some(host));
                }
            }
        }
        for binary_annotation in &z.binary_annotations {
            if let Some(host) = &binary_annotation.host {
                if !host.service_name.is_empty() {
                    return (host.service_name.clone(), Some(host));
                }
            }
        }
        (UNKNOWN_SERVICE_NAME.to_owned(), None)
    }
}

fn kind_tag(annotations: &[Annotation]) -> Option<KeyValue> {
    for annotation in annotations {
        let kind = match annotation.value.as_str() {
            CLIENT_SEND | CLIENT_RECV => "client",
            SERVER_RECV | SERVER_SEND => "server",
            MESSAGE_SEND => "producer",
            MESSAGE_RECV => "consumer",
            _ => continue,
        };
        return Some(KeyValue::string(SPAN_KIND_TAG, kind));
    }
    None
}

fn peer_tags(host: &Endpoint) -> Vec<KeyValue> {
    let mut tags = Vec::new();
    if !host.service_name.is_empty() {
        tags.push(KeyValue::string(PEER_SERVICE_TAG, host.service_name.clone()));
    }
    if host.ipv4 != 0 {
        tags.push(KeyValue::int64(PEER_IPV4_TAG, i64::from(host.ipv4 as u32)));
    }
    if !host.ipv6.is_empty() {
        tags.push(KeyValue::binary(PEER_IPV6_TAG, host.ipv6.clone()));
    }
    if host.port != 0 {
        tags.push(KeyValue::int64(
            PEER_PORT_TAG,
            i64::from(endpoint::port_to_wire(host.port)),
        ));
    }
    tags
}

// A numeric value whose byte width does not match its declared type
// degrades to a binary tag; a malformed producer must not lose the span.
fn typed_tag(ba: &BinaryAnnotation) -> KeyValue {
    let key = ba.key.clone();
    match ba.annotation_type {
        AnnotationType::Bool => KeyValue::bool(key, ba.value.first().is_some_and(|b| *b != 0)),
        AnnotationType::Bytes => KeyValue::binary(key, ba.value.clone()),
        AnnotationType::I16 => match <[u8; 2]>::try_from(ba.value.as_slice()) {
            Ok(bytes) => KeyValue::int64(key, i64::from(i16::from_le_bytes(bytes))),
            Err(_) => KeyValue::binary(key, ba.value.clone()),
        },
        AnnotationType::I32 => match <[u8; 4]>::try_from(ba.value.as_slice()) {
            Ok(bytes) => KeyValue::int64(key, i64::from(i32::from_le_bytes(bytes))),
            Err(_) => KeyValue::binary(key, ba.value.clone()),
        },
        AnnotationType::I64 => match <[u8; 8]>::try_from(ba.value.as_slice()) {
            Ok(bytes) => KeyValue::int64(key, i64::from_le_bytes(bytes)),
            Err(_) => KeyValue::binary(key, ba.value.clone()),
        },
        AnnotationType::Double => match <[u8; 8]>::try_from(ba.value.as_slice()) {
            Ok(bytes) => KeyValue::float64(key, f64::from_le_bytes(bytes)),
            Err(_) => KeyValue::binary(key, ba.value.clone()),
        },
        AnnotationType::String => {
            KeyValue::string(key, String::from_utf8_lossy(&ba.value).into_owned())
        }
    }
}

/// Convert a canonical span back into the v1 in-memory model, the
/// inverse of [`Translator::to_canonical`] for exported spans.
pub fn from_canonical(span: &Span) -> zipkincore::Span {
    let local = local_endpoint(span);

    let mut annotations: Vec<Annotation> = span
        .logs
        .iter()
        .map(|log| Annotation {
            timestamp: log.timestamp,
            value: event_value(log),
            host: Some(local.clone()),
        })
        .collect();

    let has_core_annotation = annotations.iter().any(|a| {
        is_core_annotation(&a.value) || a.value == MESSAGE_SEND || a.value == MESSAGE_RECV
    });

    let mut binary_annotations: Vec<BinaryAnnotation> = Vec::new();
    for tag in &span.tags {
        if tag.key == SPAN_KIND_TAG {
            if !has_core_annotation {
                if let TagValue::String(kind) = &tag.value {
                    annotations.extend(kind_annotations(kind, span, &local));
                }
            }
            continue;
        }
        if tag.key == COMPONENT_TAG {
            if let TagValue::String(component) = &tag.value {
                binary_annotations.push(BinaryAnnotation {
                    key: LOCAL_COMPONENT.to_owned(),
                    value: component.clone().into_bytes(),
                    annotation_type: AnnotationType::String,
                    host: Some(local.clone()),
                });
                continue;
            }
        }
        binary_annotations.push(binary_annotation_from_tag(tag, &local));
    }

    // Keep the service name recoverable for spans with no other payload.
    if annotations.is_empty() && binary_annotations.is_empty() && !local.service_name.is_empty() {
        binary_annotations.push(BinaryAnnotation {
            key: LOCAL_COMPONENT.to_owned(),
            value: Vec::new(),
            annotation_type: AnnotationType::String,
            host: Some(local),
        });
    }

    zipkincore::Span {
        trace_id: span.trace_id.low as i64,
        trace_id_high: span.trace_id.high as i64,
        id: span.span_id.0 as i64,
        parent_id: (!span.parent_span_id.is_zero()).then_some(span.parent_span_id.0 as i64),
        name: span.operation_name.clone(),
        annotations,
        binary_annotations,
        debug: span.flags.is_debug(),
        timestamp: (span.start_time != 0).then_some(span.start_time),
        duration: (span.duration != 0).then_some(span.duration),
    }
}

fn local_endpoint(span: &Span) -> Endpoint {
    let ipv4 = span
        .process
        .tags
        .iter()
        .find(|kv| kv.key == PROCESS_IP_TAG)
        .and_then(|kv| match kv.value {
            TagValue::Int64(packed) => Some(packed as u32 as i32),
            _ => None,
        })
        .unwrap_or(0);
    Endpoint {
        ipv4,
        port: 0,
        service_name: span.process.service_name.clone(),
        ipv6: Vec::new(),
    }
}

fn event_value(log: &Log) -> String {
    if let [field] = log.fields.as_slice() {
        if field.key == EVENT_LOG_FIELD {
            if let TagValue::String(value) = &field.value {
                return value.clone();
            }
        }
    }
    let mut map = serde_json::Map::new();
    for field in &log.fields {
        let value = match &field.value {
            TagValue::String(s) => serde_json::Value::from(s.clone()),
            TagValue::Bool(b) => serde_json::Value::from(*b),
            TagValue::Int64(n) => serde_json::Value::from(*n),
            TagValue::Float64(f) => serde_json::Value::from(*f),
            TagValue::Binary(b) => serde_json::Value::from(format!("{b:?}")),
        };
        map.insert(field.key.clone(), value);
    }
    serde_json::Value::Object(map).to_string()
}

fn kind_annotations(kind: &str, span: &Span, local: &Endpoint) -> Vec<Annotation> {
    let start = span.start_time;
    let end = span.start_time + span.duration;
    let stamps: Vec<(&str, i64)> = match kind {
        "client" => vec![(CLIENT_SEND, start), (CLIENT_RECV, end)],
        "server" => vec![(SERVER_RECV, start), (SERVER_SEND, end)],
        "producer" => vec![(MESSAGE_SEND, start)],
        "consumer" => vec![(MESSAGE_RECV, start)],
        _ => Vec::new(),
    };
    stamps
        .into_iter()
        .map(|(value, timestamp)| Annotation {
            timestamp,
            value: value.to_owned(),
            host: Some(local.clone()),
        })
        .collect()
}

fn binary_annotation_from_tag(tag: &KeyValue, local: &Endpoint) -> BinaryAnnotation {
    let (value, annotation_type) = match &tag.value {
        TagValue::String(s) => (s.clone().into_bytes(), AnnotationType::String),
        TagValue::Bool(b) => (vec![u8::from(*b)], AnnotationType::Bool),
        TagValue::Int64(n) => (n.to_le_bytes().to_vec(), AnnotationType::I64),
        TagValue::Float64(f) => (f.to_le_bytes().to_vec(), AnnotationType::Double),
        TagValue::Binary(b) => (b.clone(), AnnotationType::Bytes),
    };
    BinaryAnnotation {
        key: tag.key.clone(),
        value,
        annotation_type,
        host: Some(local.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(service: &str) -> Endpoint {
        Endpoint {
            service_name: service.to_owned(),
            ipv4: 0x7f000001,
            port: 80,
            ipv6: Vec::new(),
        }
    }

    fn annotation(value: &str, timestamp: i64, service: Option<&str>) -> Annotation {
        Annotation {
            timestamp,
            value: value.to_owned(),
            host: service.map(endpoint),
        }
    }

    #[test]
    fn first_core_annotation_with_host_names_the_service() {
        let z = zipkincore::Span {
            trace_id: 1,
            id: 2,
            annotations: vec![
                annotation("cs", 10, Some("first")),
                annotation("cr", 20, Some("second")),
            ],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        assert_eq!(spans[0].process.service_name, "first");
    }

    #[test]
    fn hostless_and_non_core_annotations_are_skipped_for_inference() {
        let z = zipkincore::Span {
            annotations: vec![
                annotation("cs", 10, None),
                annotation("custom", 15, Some("eventful")),
                annotation("sr", 20, Some("named")),
            ],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        assert_eq!(spans[0].process.service_name, "named");
    }

    #[test]
    fn binary_annotation_host_is_the_fallback() {
        let z = zipkincore::Span {
            binary_annotations: vec![BinaryAnnotation {
                key: "lc".to_owned(),
                value: Vec::new(),
                annotation_type: AnnotationType::String,
                host: Some(endpoint("component-svc")),
            }],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        assert_eq!(spans[0].process.service_name, "component-svc");
    }

    #[test]
    fn spans_without_any_host_get_unknown_service() {
        let spans = Translator::new().to_canonical(&[zipkincore::Span::default()]);
        assert_eq!(spans[0].process.service_name, UNKNOWN_SERVICE_NAME);
    }

    #[test]
    fn haproxy_values_count_only_in_legacy_mode() {
        let z = zipkincore::Span {
            annotations: vec![annotation("haproxy.connect", 5, Some("edge-lb"))],
            ..Default::default()
        };
        let strict = Translator::new().to_canonical(std::slice::from_ref(&z));
        assert_eq!(strict[0].process.service_name, UNKNOWN_SERVICE_NAME);

        let legacy = Translator::new()
            .with_legacy_core_annotations(true)
            .to_canonical(&[z]);
        assert_eq!(legacy[0].process.service_name, "edge-lb");
    }

    #[test]
    fn core_annotations_set_kind_and_survive_as_logs() {
        let z = zipkincore::Span {
            annotations: vec![
                annotation("sr", 10, Some("svc")),
                annotation("custom-event", 12, Some("svc")),
                annotation("ss", 20, Some("svc")),
            ],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        let span = &spans[0];
        assert_eq!(
            span.tag(SPAN_KIND_TAG),
            Some(&TagValue::String("server".to_owned()))
        );
        assert_eq!(span.logs.len(), 3);
        assert_eq!(
            span.logs[1].fields[0].value,
            TagValue::String("custom-event".to_owned())
        );
    }

    #[test]
    fn address_annotations_become_peer_tags() {
        let z = zipkincore::Span {
            binary_annotations: vec![BinaryAnnotation {
                key: SERVER_ADDR.to_owned(),
                value: vec![1],
                annotation_type: AnnotationType::Bool,
                host: Some(Endpoint {
                    service_name: "backend".to_owned(),
                    ipv4: 0x0a000001,
                    port: -1,
                    ipv6: Vec::new(),
                }),
            }],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        let span = &spans[0];
        assert_eq!(
            span.tag(PEER_SERVICE_TAG),
            Some(&TagValue::String("backend".to_owned()))
        );
        assert_eq!(span.tag(PEER_IPV4_TAG), Some(&TagValue::Int64(0x0a000001)));
        assert_eq!(span.tag(PEER_PORT_TAG), Some(&TagValue::Int64(65535)));
    }

    #[test]
    fn local_component_becomes_component_tag() {
        let z = zipkincore::Span {
            binary_annotations: vec![BinaryAnnotation {
                key: LOCAL_COMPONENT.to_owned(),
                value: b"db-pool".to_vec(),
                annotation_type: AnnotationType::String,
                host: Some(endpoint("svc")),
            }],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        assert_eq!(
            spans[0].tag(COMPONENT_TAG),
            Some(&TagValue::String("db-pool".to_owned()))
        );
    }

    #[test]
    fn mis_sized_numeric_values_fall_back_to_binary_tags() {
        let z = zipkincore::Span {
            binary_annotations: vec![BinaryAnnotation {
                key: "short".to_owned(),
                value: vec![1, 2, 3],
                annotation_type: AnnotationType::I64,
                host: None,
            }],
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        assert_eq!(
            spans[0].tag("short"),
            Some(&TagValue::Binary(vec![1, 2, 3]))
        );
    }

    #[test]
    fn debug_flag_and_ids_carry_over() {
        let z = zipkincore::Span {
            trace_id: 0x0b,
            trace_id_high: 0x0a,
            id: 0x0c,
            parent_id: Some(0x0d),
            debug: true,
            timestamp: Some(100),
            duration: Some(50),
            ..Default::default()
        };
        let spans = Translator::new().to_canonical(&[z]);
        let span = &spans[0];
        assert_eq!(span.trace_id, TraceId::new(0x0a, 0x0b));
        assert_eq!(span.span_id, SpanId(0x0c));
        assert_eq!(span.parent_span_id, SpanId(0x0d));
        assert!(span.flags.is_debug());
        assert_eq!(span.start_time, 100);
        assert_eq!(span.duration, 50);
    }

    #[test]
    fn canonical_round_trip_preserves_identity_fields_and_tag_order() {
        let z = zipkincore::Span {
            trace_id: 0x2222,
            trace_id_high: 0x1111,
            id: 0x3333,
            parent_id: Some(0x4444),
            name: "round-trip".to_owned(),
            timestamp: Some(1_000),
            duration: Some(2_000),
            annotations: vec![
                annotation("cs", 1_000, Some("svc")),
                annotation("cr", 3_000, Some("svc")),
            ],
            binary_annotations: vec![
                BinaryAnnotation {
                    key: "http.path".to_owned(),
                    value: b"/things".to_vec(),
                    annotation_type: AnnotationType::String,
                    host: Some(endpoint("svc")),
                },
                BinaryAnnotation {
                    key: "retries".to_owned(),
                    value: 2i64.to_le_bytes().to_vec(),
                    annotation_type: AnnotationType::I64,
                    host: Some(endpoint("svc")),
                },
            ],
            ..Default::default()
        };
        let translator = Translator::new();
        let first = &translator.to_canonical(std::slice::from_ref(&z))[0];
        let second = &translator.to_canonical(&[from_canonical(first)])[0];

        assert_eq!(second.trace_id, first.trace_id);
        assert_eq!(second.span_id, first.span_id);
        assert_eq!(second.parent_span_id, first.parent_span_id);
        assert_eq!(second.operation_name, first.operation_name);
        assert_eq!(second.start_time, first.start_time);
        assert_eq!(second.duration, first.duration);
        assert_eq!(second.process.service_name, first.process.service_name);
        let first_keys: Vec<&str> = first.tags.iter().map(|kv| kv.key.as_str()).collect();
        let second_keys: Vec<&str> = second.tags.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(second_keys, first_keys);
    }
}
