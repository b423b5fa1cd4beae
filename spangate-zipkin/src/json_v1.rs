//! Zipkin v1 JSON wire model.
//!
//! Decodes `POST /api/v1/spans` JSON bodies into [`zipkincore`] values
//! and serializes them back out, round-tripping ids, timestamps, and
//! binary-annotation byte encodings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spangate_model::{SpanId, TraceId};
use typed_builder::TypedBuilder;

use crate::endpoint;
use crate::error::ZipkinError;
use crate::zipkincore::{self, AnnotationType};

/// Decode a JSON array of v1 span objects.
pub fn decode_json_v1(bytes: &[u8]) -> Result<Vec<zipkincore::Span>, ZipkinError> {
    let spans: Vec<JsonSpan> = serde_json::from_slice(bytes)?;
    spans.iter().map(span_from_json).collect()
}

/// Serialize spans as a JSON array of v1 span objects.
pub fn encode_json_v1(spans: &[zipkincore::Span]) -> Result<Vec<u8>, ZipkinError> {
    let json: Vec<JsonSpan> = spans.iter().map(span_to_json).collect();
    Ok(serde_json::to_vec(&json)?)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonSpan {
    #[serde(default)]
    trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<i64>,
    #[serde(default)]
    debug: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    annotations: Vec<JsonAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    binary_annotations: Vec<JsonBinaryAnnotation>,
}

#[derive(TypedBuilder, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonAnnotation {
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    value: String,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<JsonEndpoint>,
}

#[derive(TypedBuilder, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonBinaryAnnotation {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: Value,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    annotation_type: Option<JsonAnnotationType>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<JsonEndpoint>,
}

#[derive(TypedBuilder, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonEndpoint {
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    service_name: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    ipv4: String,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ipv6: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum JsonAnnotationType {
    Bool,
    Bytes,
    I16,
    I32,
    I64,
    Double,
    String,
}

fn span_from_json(json: &JsonSpan) -> Result<zipkincore::Span, ZipkinError> {
    let trace_id: TraceId = json.trace_id.parse()?;
    let id: SpanId = json.id.parse()?;
    let parent_id = match json.parent_id.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<SpanId>()?.0 as i64),
    };
    Ok(zipkincore::Span {
        trace_id: trace_id.low as i64,
        trace_id_high: trace_id.high as i64,
        id: id.0 as i64,
        parent_id,
        name: json.name.clone(),
        annotations: json
            .annotations
            .iter()
            .map(annotation_from_json)
            .collect::<Result<_, _>>()?,
        binary_annotations: json
            .binary_annotations
            .iter()
            .map(binary_annotation_from_json)
            .collect::<Result<_, _>>()?,
        debug: json.debug,
        timestamp: json.timestamp,
        duration: json.duration,
    })
}

fn annotation_from_json(json: &JsonAnnotation) -> Result<zipkincore::Annotation, ZipkinError> {
    Ok(zipkincore::Annotation {
        timestamp: json.timestamp,
        value: json.value.clone(),
        host: json.endpoint.as_ref().map(endpoint_from_json).transpose()?,
    })
}

fn binary_annotation_from_json(
    json: &JsonBinaryAnnotation,
) -> Result<zipkincore::BinaryAnnotation, ZipkinError> {
    let annotation_type = match json.annotation_type.unwrap_or(JsonAnnotationType::String) {
        JsonAnnotationType::Bool => AnnotationType::Bool,
        JsonAnnotationType::Bytes => AnnotationType::Bytes,
        JsonAnnotationType::I16 => AnnotationType::I16,
        JsonAnnotationType::I32 => AnnotationType::I32,
        JsonAnnotationType::I64 => AnnotationType::I64,
        JsonAnnotationType::Double => AnnotationType::Double,
        JsonAnnotationType::String => AnnotationType::String,
    };
    let value = match annotation_type {
        AnnotationType::Bool => vec![u8::from(
            json.value
                .as_bool()
                .ok_or_else(|| value_mismatch(&json.key, "bool"))?,
        )],
        AnnotationType::I16 => (number_value(json)? as i16).to_le_bytes().to_vec(),
        AnnotationType::I32 => (number_value(json)? as i32).to_le_bytes().to_vec(),
        AnnotationType::I64 => (number_value(json)? as i64).to_le_bytes().to_vec(),
        AnnotationType::Double => number_value(json)?.to_le_bytes().to_vec(),
        AnnotationType::String => string_value(json)?.as_bytes().to_vec(),
        AnnotationType::Bytes => STANDARD.decode(string_value(json)?)?,
    };
    Ok(zipkincore::BinaryAnnotation {
        key: json.key.clone(),
        value,
        annotation_type,
        host: json.endpoint.as_ref().map(endpoint_from_json).transpose()?,
    })
}

fn number_value(json: &JsonBinaryAnnotation) -> Result<f64, ZipkinError> {
    json.value
        .as_f64()
        .ok_or_else(|| value_mismatch(&json.key, "number"))
}

fn string_value(json: &JsonBinaryAnnotation) -> Result<&str, ZipkinError> {
    json.value
        .as_str()
        .ok_or_else(|| value_mismatch(&json.key, "string"))
}

fn value_mismatch(key: &str, expected: &str) -> ZipkinError {
    ZipkinError::Format(format!(
        "binary annotation {key:?} value is not a {expected}"
    ))
}

fn endpoint_from_json(json: &JsonEndpoint) -> Result<zipkincore::Endpoint, ZipkinError> {
    Ok(zipkincore::Endpoint {
        ipv4: endpoint::ipv4_from_string(&json.ipv4)?,
        port: json.port.map(endpoint::port_from_wire).unwrap_or(0),
        service_name: json.service_name.clone(),
        ipv6: match json.ipv6.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => endpoint::ipv6_from_string(raw)?,
        },
    })
}

fn span_to_json(span: &zipkincore::Span) -> JsonSpan {
    JsonSpan {
        trace_id: TraceId::new(span.trace_id_high as u64, span.trace_id as u64).to_string(),
        parent_id: span.parent_id.map(|id| SpanId(id as u64).to_string()),
        id: SpanId(span.id as u64).to_string(),
        name: span.name.clone(),
        timestamp: span.timestamp,
        duration: span.duration,
        debug: span.debug,
        annotations: span.annotations.iter().map(annotation_to_json).collect(),
        binary_annotations: span
            .binary_annotations
            .iter()
            .map(binary_annotation_to_json)
            .collect(),
    }
}

fn annotation_to_json(annotation: &zipkincore::Annotation) -> JsonAnnotation {
    let builder = JsonAnnotation::builder()
        .timestamp(annotation.timestamp)
        .value(annotation.value.clone());
    match annotation.host.as_ref().map(endpoint_to_json) {
        Some(endpoint) => builder.endpoint(endpoint).build(),
        None => builder.build(),
    }
}

fn binary_annotation_to_json(
    binary_annotation: &zipkincore::BinaryAnnotation,
) -> JsonBinaryAnnotation {
    let (value, annotation_type) = match binary_annotation.annotation_type {
        AnnotationType::Bool => (
            Value::from(binary_annotation.value.first().is_some_and(|b| *b != 0)),
            JsonAnnotationType::Bool,
        ),
        AnnotationType::Bytes => (
            Value::from(STANDARD.encode(&binary_annotation.value)),
            JsonAnnotationType::Bytes,
        ),
        AnnotationType::I16 => (
            Value::from(le_i64(&binary_annotation.value, 2)),
            JsonAnnotationType::I16,
        ),
        AnnotationType::I32 => (
            Value::from(le_i64(&binary_annotation.value, 4)),
            JsonAnnotationType::I32,
        ),
        AnnotationType::I64 => (
            Value::from(le_i64(&binary_annotation.value, 8)),
            JsonAnnotationType::I64,
        ),
        AnnotationType::Double => {
            let bits: [u8; 8] = binary_annotation
                .value
                .as_slice()
                .try_into()
                .unwrap_or_default();
            (
                Value::from(f64::from_le_bytes(bits)),
                JsonAnnotationType::Double,
            )
        }
        AnnotationType::String => (
            Value::from(String::from_utf8_lossy(&binary_annotation.value).into_owned()),
            JsonAnnotationType::String,
        ),
    };
    let builder = JsonBinaryAnnotation::builder()
        .key(binary_annotation.key.clone())
        .value(value)
        .annotation_type(annotation_type);
    match binary_annotation.host.as_ref().map(endpoint_to_json) {
        Some(endpoint) => builder.endpoint(endpoint).build(),
        None => builder.build(),
    }
}

// Reassembles a little-endian integer of the given width, sign-extending
// from the top byte. Short or overlong buffers fall back to zero.
fn le_i64(bytes: &[u8], width: usize) -> i64 {
    if bytes.len() != width {
        return 0;
    }
    match width {
        2 => i64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
        4 => i64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => i64::from_le_bytes(bytes.try_into().unwrap_or_default()),
    }
}

fn endpoint_to_json(endpoint: &zipkincore::Endpoint) -> JsonEndpoint {
    JsonEndpoint {
        service_name: endpoint.service_name.clone(),
        ipv4: endpoint::ipv4_to_string(endpoint.ipv4).unwrap_or_default(),
        ipv6: endpoint::ipv6_to_string(&endpoint.ipv6),
        port: (endpoint.port != 0).then(|| i64::from(endpoint::port_to_wire(endpoint.port))),
    }
}
