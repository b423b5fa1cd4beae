//! Zipkin v2 JSON wire model.

use serde::Deserialize;
use serde_json::Value;
use spangate_model::{SpanId, TraceId};

use crate::endpoint;
use crate::error::ZipkinError;
use crate::v2::{into_v1_span, Kind, V2Span};
use crate::zipkincore;

/// Decode a JSON array of v2 span objects into the v1 in-memory model.
pub fn decode_json_v2(bytes: &[u8]) -> Result<Vec<zipkincore::Span>, ZipkinError> {
    let spans: Vec<JsonSpanV2> = serde_json::from_slice(bytes)?;
    spans
        .into_iter()
        .map(|span| Ok(into_v1_span(v2_from_json(span)?)))
        .collect()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonSpanV2 {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: Option<JsonKind>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    debug: bool,
    // Accepted on the wire; shared spans carry no extra v1 meaning here.
    #[serde(default, rename = "shared")]
    _shared: bool,
    #[serde(default)]
    local_endpoint: Option<JsonEndpointV2>,
    #[serde(default)]
    remote_endpoint: Option<JsonEndpointV2>,
    #[serde(default)]
    annotations: Vec<JsonAnnotationV2>,
    // serde_json's order-preserving map keeps tag synthesis stable.
    #[serde(default)]
    tags: serde_json::Map<String, Value>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum JsonKind {
    Client,
    Server,
    Producer,
    Consumer,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonEndpointV2 {
    #[serde(default)]
    service_name: String,
    #[serde(default)]
    ipv4: Option<String>,
    #[serde(default)]
    ipv6: Option<String>,
    #[serde(default)]
    port: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
struct JsonAnnotationV2 {
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    value: String,
}

fn v2_from_json(json: JsonSpanV2) -> Result<V2Span, ZipkinError> {
    let trace_id: TraceId = json.trace_id.parse()?;
    let id: SpanId = json.id.parse()?;
    let parent_id = match json.parent_id.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<SpanId>()?.0 as i64),
    };
    let mut tags = Vec::with_capacity(json.tags.len());
    for (key, value) in json.tags {
        let Value::String(value) = value else {
            return Err(ZipkinError::Format(format!(
                "tag {key:?} value is not a string"
            )));
        };
        tags.push((key, value));
    }
    Ok(V2Span {
        trace_id: trace_id.low as i64,
        trace_id_high: trace_id.high as i64,
        id: id.0 as i64,
        parent_id,
        name: json.name,
        kind: json.kind.map(|kind| match kind {
            JsonKind::Client => Kind::Client,
            JsonKind::Server => Kind::Server,
            JsonKind::Producer => Kind::Producer,
            JsonKind::Consumer => Kind::Consumer,
        }),
        timestamp: json.timestamp,
        duration: json.duration,
        debug: json.debug,
        local_endpoint: json.local_endpoint.map(endpoint_from_json).transpose()?,
        remote_endpoint: json.remote_endpoint.map(endpoint_from_json).transpose()?,
        annotations: json
            .annotations
            .into_iter()
            .map(|a| (a.timestamp, a.value))
            .collect(),
        tags,
    })
}

fn endpoint_from_json(json: JsonEndpointV2) -> Result<zipkincore::Endpoint, ZipkinError> {
    Ok(zipkincore::Endpoint {
        ipv4: endpoint::ipv4_from_string(json.ipv4.as_deref().unwrap_or_default())?,
        port: json.port.map(endpoint::port_from_wire).unwrap_or(0),
        service_name: json.service_name,
        ipv6: match json.ipv6.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => endpoint::ipv6_from_string(raw)?,
        },
    })
}
