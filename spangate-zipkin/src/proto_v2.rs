//! Zipkin v2 protobuf wire format.

use prost::Message as _;

use crate::error::ZipkinError;
use crate::proto::zipkin as proto;
use crate::v2::{into_v1_span, Kind, V2Span};
use crate::zipkincore;

/// Decode a protobuf `ListOfSpans` payload into the v1 in-memory model.
pub fn decode_proto_v2(bytes: &[u8]) -> Result<Vec<zipkincore::Span>, ZipkinError> {
    let list = proto::ListOfSpans::decode(bytes)?;
    list.spans
        .into_iter()
        .map(|span| Ok(into_v1_span(v2_from_proto(span)?)))
        .collect()
}

fn v2_from_proto(span: proto::Span) -> Result<V2Span, ZipkinError> {
    let (trace_id_high, trace_id) = match span.trace_id.len() {
        16 => (
            be_i64(&span.trace_id[..8]),
            be_i64(&span.trace_id[8..]),
        ),
        len => {
            return Err(ZipkinError::InvalidId(format!(
                "trace id must be 16 bytes, got {len}"
            )))
        }
    };
    let id = match span.id.len() {
        8 => be_i64(&span.id),
        len => {
            return Err(ZipkinError::InvalidId(format!(
                "span id must be 8 bytes, got {len}"
            )))
        }
    };
    let parent_id = match span.parent_id.len() {
        0 => None,
        8 => Some(be_i64(&span.parent_id)),
        len => {
            return Err(ZipkinError::InvalidId(format!(
                "parent id must be 0 or 8 bytes, got {len}"
            )))
        }
    };
    Ok(V2Span {
        trace_id,
        trace_id_high,
        id,
        parent_id,
        name: span.name,
        kind: match proto::span::Kind::try_from(span.kind) {
            Ok(proto::span::Kind::Client) => Some(Kind::Client),
            Ok(proto::span::Kind::Server) => Some(Kind::Server),
            Ok(proto::span::Kind::Producer) => Some(Kind::Producer),
            Ok(proto::span::Kind::Consumer) => Some(Kind::Consumer),
            Ok(proto::span::Kind::SpanKindUnspecified) | Err(_) => None,
        },
        timestamp: (span.timestamp != 0).then_some(span.timestamp as i64),
        duration: (span.duration != 0).then_some(span.duration as i64),
        debug: span.debug,
        local_endpoint: span.local_endpoint.map(endpoint_from_proto).transpose()?,
        remote_endpoint: span.remote_endpoint.map(endpoint_from_proto).transpose()?,
        annotations: span
            .annotations
            .into_iter()
            .map(|a| (a.timestamp as i64, a.value))
            .collect(),
        tags: span
            .tags
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect(),
    })
}

fn endpoint_from_proto(endpoint: proto::Endpoint) -> Result<zipkincore::Endpoint, ZipkinError> {
    let ipv4 = match endpoint.ipv4.len() {
        0 => 0,
        4 => i32::from_be_bytes([
            endpoint.ipv4[0],
            endpoint.ipv4[1],
            endpoint.ipv4[2],
            endpoint.ipv4[3],
        ]),
        _ => return Err(ZipkinError::WrongIpv4),
    };
    let ipv6 = match endpoint.ipv6.len() {
        0 | 16 => endpoint.ipv6,
        _ => return Err(ZipkinError::WrongIpv6),
    };
    Ok(zipkincore::Endpoint {
        ipv4,
        port: endpoint.port as u16 as i16,
        service_name: endpoint.service_name,
        ipv6,
    })
}

fn be_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    fn base_span() -> proto::Span {
        proto::Span {
            trace_id: vec![0, 0, 0, 0, 0, 0, 0, 0x22, 0, 0, 0, 0, 0, 0, 0, 0x33],
            id: vec![0, 0, 0, 0, 0, 0, 0, 0x11],
            name: "op".to_owned(),
            kind: proto::span::Kind::Client as i32,
            timestamp: 100,
            duration: 50,
            local_endpoint: Some(proto::Endpoint {
                service_name: "lhs".to_owned(),
                ipv4: vec![127, 0, 0, 1],
                port: 65535,
                ..Default::default()
            }),
            remote_endpoint: Some(proto::Endpoint {
                service_name: "rhs".to_owned(),
                ..Default::default()
            }),
            tags: vec![
                proto::TagEntry {
                    key: "z".to_owned(),
                    value: "1".to_owned(),
                },
                proto::TagEntry {
                    key: "a".to_owned(),
                    value: "2".to_owned(),
                },
            ],
            ..Default::default()
        }
    }

    fn encode(spans: Vec<proto::Span>) -> Vec<u8> {
        proto::ListOfSpans { spans }.encode_to_vec()
    }

    #[test]
    fn decodes_ids_and_endpoints() {
        let spans = decode_proto_v2(&encode(vec![base_span()])).unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.trace_id_high, 0x22);
        assert_eq!(span.trace_id, 0x33);
        assert_eq!(span.id, 0x11);
        assert_eq!(span.parent_id, None);
        assert_eq!(span.annotations[0].value, "cs");
        let host = span.annotations[0].host.as_ref().unwrap();
        assert_eq!(host.ipv4, 0x7f000001);
        assert_eq!(host.port, -1);
        // Address annotation first, then tags in received order.
        let keys: Vec<&str> = span
            .binary_annotations
            .iter()
            .map(|b| b.key.as_str())
            .collect();
        assert_eq!(keys, ["sa", "z", "a"]);
    }

    #[test]
    fn rejects_wrong_id_lengths() {
        let mut short_trace = base_span();
        short_trace.trace_id = vec![1, 2, 3];
        assert!(matches!(
            decode_proto_v2(&encode(vec![short_trace])),
            Err(ZipkinError::InvalidId(_))
        ));

        let mut short_span = base_span();
        short_span.id = vec![1];
        assert!(matches!(
            decode_proto_v2(&encode(vec![short_span])),
            Err(ZipkinError::InvalidId(_))
        ));

        let mut bad_parent = base_span();
        bad_parent.parent_id = vec![1, 2];
        assert!(matches!(
            decode_proto_v2(&encode(vec![bad_parent])),
            Err(ZipkinError::InvalidId(_))
        ));
    }

    #[test]
    fn rejects_wrong_address_lengths() {
        let mut bad_ipv4 = base_span();
        bad_ipv4.local_endpoint.as_mut().unwrap().ipv4 = vec![1, 2];
        assert!(matches!(
            decode_proto_v2(&encode(vec![bad_ipv4])),
            Err(ZipkinError::WrongIpv4)
        ));

        let mut bad_ipv6 = base_span();
        bad_ipv6.local_endpoint.as_mut().unwrap().ipv6 = vec![1, 2, 3];
        assert!(matches!(
            decode_proto_v2(&encode(vec![bad_ipv6])),
            Err(ZipkinError::WrongIpv6)
        ));
    }

    #[test]
    fn garbage_payload_is_a_format_error() {
        assert!(matches!(
            decode_proto_v2(&[0xff, 0xff, 0xff]),
            Err(ZipkinError::Format(_))
        ));
    }
}
