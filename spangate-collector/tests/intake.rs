//! End-to-end intake scenarios driven through the HTTP handlers.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt as _, Full};
use spangate_collector::testing::InMemorySpanWriter;
use spangate_collector::{
    CollectorConfig, JaegerHandler, SpanOrigin, SpanProcessor, ZipkinHandler,
};
use spangate_model::{RefType, SpanId, TagValue, TraceId};

const V1_BODY: &str = r#"[{
    "name": "op",
    "id": "bd7a977555f6b982",
    "traceId": "bd7a974555f6b982bd71977555f6b981",
    "parentId": "1",
    "timestamp": 156,
    "duration": 15145,
    "annotations": [{
        "value": "cs",
        "timestamp": 152,
        "endpoint": {"serviceName": "foo", "ipv4": "127.0.0.1", "port": 80}
    }],
    "binaryAnnotations": []
}]"#;

struct Harness {
    writer: InMemorySpanWriter,
    processor: Arc<SpanProcessor>,
    zipkin: ZipkinHandler,
    jaeger: JaegerHandler,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(
            CollectorConfig::default()
                .with_queue_size(64)
                .with_num_workers(2)
                .with_shutdown_timeout(Duration::from_secs(5)),
        )
    }

    fn with_config(config: CollectorConfig) -> Self {
        let writer = InMemorySpanWriter::new();
        let processor = Arc::new(SpanProcessor::new(config, Arc::new(writer.clone())));
        Harness {
            writer,
            zipkin: ZipkinHandler::new(Arc::clone(&processor)),
            jaeger: JaegerHandler::new(Arc::clone(&processor)),
            processor,
        }
    }

    // Close the processor so every accepted span has been written.
    fn drain(&self) -> Vec<spangate_model::Span> {
        self.processor.close();
        self.writer.written_spans()
    }
}

fn request(content_type: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/spans")
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(body.into()))
        .unwrap()
}

async fn body_text(response: Response<Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn v1_json_happy_path() {
    let harness = Harness::new();
    let response = harness
        .zipkin
        .handle_v1(request("application/json", V1_BODY))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let spans = harness.drain();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(
        span.trace_id,
        TraceId::new(0xbd7a974555f6b982, 0xbd71977555f6b981)
    );
    assert_eq!(span.span_id, SpanId(0xbd7a977555f6b982));
    assert_eq!(span.parent_span_id, SpanId(1));
    assert_eq!(span.operation_name, "op");
    assert_eq!(span.process.service_name, "foo");
    // Parent reference injected by the sanitizer chain.
    assert_eq!(span.references.len(), 1);
    assert_eq!(span.references[0].span_id, SpanId(1));
    assert_eq!(span.references[0].ref_type, RefType::ChildOf);
    assert_eq!(span.references[0].trace_id, span.trace_id);
    // The annotation survives as a log.
    assert_eq!(span.logs.len(), 1);
    assert_eq!(span.logs[0].timestamp, 152);
    assert_eq!(
        span.logs[0].fields[0].value,
        TagValue::String("cs".to_owned())
    );
}

#[tokio::test]
async fn v1_json_with_charset_parameter_is_accepted() {
    let harness = Harness::new();
    let response = harness
        .zipkin
        .handle_v1(request("application/json; charset=utf-8", V1_BODY))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(harness.drain().len(), 1);
}

#[tokio::test]
async fn v1_json_bad_ipv4_rejects_batch() {
    let harness = Harness::new();
    let body = V1_BODY.replace("127.0.0.1", "127.0.0.A");
    let response = harness
        .zipkin
        .handle_v1(request("application/json", body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await,
        "Unable to process request body: wrong ipv4\n"
    );
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn v1_json_empty_id_rejects_batch() {
    let harness = Harness::new();
    let body = V1_BODY.replace("bd7a977555f6b982", "");
    let response = harness
        .zipkin
        .handle_v1(request("application/json", body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .starts_with("Unable to process request body: "));
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn v1_thrift_gzip_round_trip() {
    let harness = Harness::new();
    let thrift_spans = vec![spangate_zipkin::zipkincore::Span {
        trace_id: 0x42,
        id: 0x43,
        name: "compressed".to_owned(),
        timestamp: Some(1_000),
        duration: Some(10),
        ..Default::default()
    }];
    let payload = gzip(&spangate_zipkin::encode_thrift_v1(&thrift_spans).unwrap());
    let mut req = request("application/x-thrift", payload);
    req.headers_mut()
        .insert(CONTENT_ENCODING, "gzip".parse().unwrap());

    let response = harness.zipkin.handle_v1(req).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let spans = harness.drain();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].operation_name, "compressed");
    assert_eq!(spans[0].trace_id, TraceId::new(0, 0x42));
}

#[tokio::test]
async fn corrupt_gzip_is_a_bad_request() {
    let harness = Harness::new();
    let mut req = request("application/json", "not gzip at all");
    req.headers_mut()
        .insert(CONTENT_ENCODING, "gzip".parse().unwrap());
    let response = harness.zipkin.handle_v1(req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .starts_with("Unable to process request body: "));
}

#[tokio::test]
async fn v2_json_client_kind_synthesis() {
    let harness = Harness::new();
    let body = r#"[{
        "id": "1111111111111111",
        "traceId": "2222222222222222",
        "kind": "CLIENT",
        "timestamp": 100,
        "duration": 50,
        "localEndpoint": {"serviceName": "lhs"},
        "remoteEndpoint": {"serviceName": "rhs"}
    }]"#;
    let response = harness
        .zipkin
        .handle_v2(request("application/json", body))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let spans = harness.drain();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.process.service_name, "lhs");
    assert_eq!(span.tag("span.kind"), Some(&TagValue::String("client".to_owned())));
    assert_eq!(
        span.tag("peer.service"),
        Some(&TagValue::String("rhs".to_owned()))
    );
    let events: Vec<(i64, &TagValue)> = span
        .logs
        .iter()
        .map(|log| (log.timestamp, &log.fields[0].value))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], (100, &TagValue::String("cs".to_owned())));
    assert_eq!(events[1], (150, &TagValue::String("cr".to_owned())));
}

#[tokio::test]
async fn v2_protobuf_is_dispatched() {
    use prost_shim::{encode_list, ProtoEndpoint, ProtoSpan};

    let harness = Harness::new();
    let payload = encode_list(vec![ProtoSpan {
        trace_id: vec![0u8; 15].into_iter().chain([0x77]).collect(),
        id: vec![0, 0, 0, 0, 0, 0, 0, 0x55],
        name: "proto-op".to_owned(),
        local_endpoint: Some(ProtoEndpoint {
            service_name: "proto-svc".to_owned(),
        }),
    }]);
    let response = harness
        .zipkin
        .handle_v2(request("application/x-protobuf", payload))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let spans = harness.drain();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].operation_name, "proto-op");
    assert_eq!(spans[0].span_id, SpanId(0x55));
    assert_eq!(spans[0].process.service_name, "proto-svc");
}

// Minimal hand-rolled protobuf encoding for the test payload, avoiding a
// dev-dependency on prost just to build two messages.
mod prost_shim {
    pub struct ProtoEndpoint {
        pub service_name: String,
    }

    pub struct ProtoSpan {
        pub trace_id: Vec<u8>,
        pub id: Vec<u8>,
        pub name: String,
        pub local_endpoint: Option<ProtoEndpoint>,
    }

    fn key(field: u32, wire_type: u32) -> Vec<u8> {
        varint(u64::from((field << 3) | wire_type))
    }

    fn varint(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    fn length_delimited(field: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = key(field, 2);
        out.extend(varint(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    fn encode_span(span: &ProtoSpan) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(length_delimited(1, &span.trace_id));
        out.extend(length_delimited(3, &span.id));
        out.extend(length_delimited(5, span.name.as_bytes()));
        if let Some(endpoint) = &span.local_endpoint {
            let nested = length_delimited(1, endpoint.service_name.as_bytes());
            out.extend(length_delimited(8, &nested));
        }
        out
    }

    pub fn encode_list(spans: Vec<ProtoSpan>) -> Vec<u8> {
        let mut out = Vec::new();
        for span in &spans {
            out.extend(length_delimited(1, &encode_span(span)));
        }
        out
    }
}

#[tokio::test]
async fn unsupported_content_type_is_rejected() {
    let harness = Harness::new();
    let response = harness
        .zipkin
        .handle_v1(request("text/plain", V1_BODY))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Unsupported Content-Type\n");
}

#[tokio::test]
async fn malformed_content_type_is_a_parse_error() {
    let harness = Harness::new();
    let response = harness
        .zipkin
        .handle_v1(request("application/", V1_BODY))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .starts_with("Cannot parse Content-Type: "));
}

#[tokio::test]
async fn half_bad_batch_enqueues_nothing() {
    let harness = Harness::new();
    let body = r#"[
        {"id": "1", "traceId": "2", "name": "fine"},
        {"id": "", "traceId": "2", "name": "broken"}
    ]"#;
    let response = harness
        .zipkin
        .handle_v1(request("application/json", body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn overflowing_span_is_rejected_but_request_is_acked() {
    let harness = Harness::with_config(
        CollectorConfig::default()
            .with_queue_size(1)
            .with_num_workers(0)
            .with_shutdown_timeout(Duration::from_millis(10)),
    );
    let body = r#"[
        {"id": "1", "traceId": "a", "name": "first"},
        {"id": "2", "traceId": "a", "name": "second"}
    ]"#;
    let response = harness
        .zipkin
        .handle_v1(request("application/json", body))
        .await;
    // The wire contract is fire-and-forget: overflow still acks.
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    harness.processor.close();
}

#[tokio::test]
async fn closed_processor_surfaces_submit_error() {
    let harness = Harness::new();
    harness.processor.close();
    let response = harness
        .zipkin
        .handle_v1(request("application/json", V1_BODY))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response)
        .await
        .starts_with("Cannot submit Zipkin batch: "));
}

#[tokio::test]
async fn jaeger_batch_over_http_stamps_process() {
    let harness = Harness::new();
    let batch = spangate_jaeger::Batch {
        process: spangate_jaeger::Process {
            service_name: "native-svc".to_owned(),
            tags: Vec::new(),
        },
        spans: vec![spangate_jaeger::Span {
            trace_id_low: 7,
            span_id: 8,
            operation_name: "native-op".to_owned(),
            start_time: 1,
            duration: 2,
            ..Default::default()
        }],
    };
    let payload = spangate_jaeger::encode_batch(&batch).unwrap();
    let response = harness
        .jaeger
        .handle_traces(request("application/vnd.apache.thrift.binary", payload))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let spans = harness.drain();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].operation_name, "native-op");
    assert_eq!(spans[0].process.service_name, "native-svc");
}

#[tokio::test]
async fn submit_batches_acks_each_batch() {
    let harness = Harness::new();
    let batch = spangate_jaeger::Batch {
        process: spangate_jaeger::Process {
            service_name: "svc".to_owned(),
            tags: Vec::new(),
        },
        spans: vec![spangate_jaeger::Span::default(); 3],
    };
    let responses = harness.jaeger.submit_batches(&[batch.clone(), batch]);
    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|r| r.ok));
    assert_eq!(harness.drain().len(), 6);
}

#[test]
fn enqueue_order_is_fifo_for_a_single_producer() {
    let writer = InMemorySpanWriter::new();
    let processor = SpanProcessor::new(
        CollectorConfig::default()
            .with_queue_size(16)
            .with_num_workers(1)
            .with_shutdown_timeout(Duration::from_secs(2)),
        Arc::new(writer.clone()),
    );
    for i in 0..8 {
        let mut span = spangate_model::Span::default();
        span.operation_name = format!("op-{i}");
        assert!(processor.enqueue(span, SpanOrigin::ZipkinV1));
    }
    processor.close();
    let names: Vec<String> = writer
        .written_spans()
        .iter()
        .map(|span| span.operation_name.clone())
        .collect();
    assert_eq!(names, (0..8).map(|i| format!("op-{i}")).collect::<Vec<_>>());
}
