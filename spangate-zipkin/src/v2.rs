//! Lowering of Zipkin v2 spans into the v1 in-memory model.
//!
//! v2 replaced core annotations with an explicit `kind` plus local and
//! remote endpoints. Both v2 decoders (JSON and Protobuf) produce
//! [`V2Span`] values, and this module synthesizes the equivalent v1
//! annotations so the rest of the pipeline only ever sees one shape.

use crate::zipkincore::{
    Annotation, AnnotationType, BinaryAnnotation, Endpoint, Span, CLIENT_ADDR, CLIENT_RECV,
    CLIENT_SEND, LOCAL_COMPONENT, MESSAGE_ADDR, MESSAGE_RECV, MESSAGE_SEND, SERVER_ADDR,
    SERVER_RECV, SERVER_SEND,
};

/// The v2 span kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Client,
    Server,
    Producer,
    Consumer,
}

/// A decoded v2 span, format-independent.
#[derive(Clone, Debug, Default)]
pub(crate) struct V2Span {
    pub trace_id: i64,
    pub trace_id_high: i64,
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub kind: Option<Kind>,
    pub timestamp: Option<i64>,
    pub duration: Option<i64>,
    pub debug: bool,
    pub local_endpoint: Option<Endpoint>,
    pub remote_endpoint: Option<Endpoint>,
    pub annotations: Vec<(i64, String)>,
    pub tags: Vec<(String, String)>,
}

/// Rewrite a v2 span in v1 terms.
pub(crate) fn into_v1_span(v2: V2Span) -> Span {
    let start = v2.timestamp.unwrap_or(0);
    let end = start + v2.duration.unwrap_or(0);

    let mut annotations: Vec<Annotation> = Vec::new();
    match v2.kind {
        Some(Kind::Server) => {
            annotations.push(annotation(SERVER_RECV, start, &v2.local_endpoint));
            annotations.push(annotation(SERVER_SEND, end, &v2.local_endpoint));
        }
        Some(Kind::Client) => {
            annotations.push(annotation(CLIENT_SEND, start, &v2.local_endpoint));
            annotations.push(annotation(CLIENT_RECV, end, &v2.local_endpoint));
        }
        Some(Kind::Producer) => {
            annotations.push(annotation(MESSAGE_SEND, start, &v2.local_endpoint));
        }
        Some(Kind::Consumer) => {
            annotations.push(annotation(MESSAGE_RECV, start, &v2.local_endpoint));
        }
        None => {}
    }
    for (timestamp, value) in v2.annotations {
        annotations.push(Annotation {
            timestamp,
            value,
            host: v2.local_endpoint.clone(),
        });
    }

    let mut binary_annotations: Vec<BinaryAnnotation> = Vec::new();
    if let Some(remote) = v2.remote_endpoint {
        let address_key = match v2.kind {
            Some(Kind::Client) => Some(SERVER_ADDR),
            Some(Kind::Server) => Some(CLIENT_ADDR),
            Some(Kind::Producer) | Some(Kind::Consumer) => Some(MESSAGE_ADDR),
            None => None,
        };
        if let Some(key) = address_key {
            binary_annotations.push(BinaryAnnotation {
                key: key.to_owned(),
                value: vec![1],
                annotation_type: AnnotationType::Bool,
                host: Some(remote),
            });
        }
    }
    for (key, value) in v2.tags {
        binary_annotations.push(BinaryAnnotation {
            key,
            value: value.into_bytes(),
            annotation_type: AnnotationType::String,
            host: v2.local_endpoint.clone(),
        });
    }

    // A span with only a local endpoint would otherwise lose its service
    // name; an empty local-component annotation keeps it recoverable.
    if v2.local_endpoint.is_some() && annotations.is_empty() && binary_annotations.is_empty() {
        binary_annotations.push(BinaryAnnotation {
            key: LOCAL_COMPONENT.to_owned(),
            value: Vec::new(),
            annotation_type: AnnotationType::String,
            host: v2.local_endpoint.clone(),
        });
    }

    Span {
        trace_id: v2.trace_id,
        trace_id_high: v2.trace_id_high,
        id: v2.id,
        parent_id: v2.parent_id,
        name: v2.name,
        annotations,
        binary_annotations,
        debug: v2.debug,
        timestamp: v2.timestamp,
        duration: v2.duration,
    }
}

fn annotation(value: &str, timestamp: i64, host: &Option<Endpoint>) -> Annotation {
    Annotation {
        timestamp,
        value: value.to_owned(),
        host: host.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Endpoint {
        Endpoint {
            service_name: "lhs".to_owned(),
            ..Default::default()
        }
    }

    fn remote() -> Endpoint {
        Endpoint {
            service_name: "rhs".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn client_kind_synthesizes_cs_cr_and_sa() {
        let span = into_v1_span(V2Span {
            id: 1,
            trace_id: 2,
            kind: Some(Kind::Client),
            timestamp: Some(100),
            duration: Some(50),
            local_endpoint: Some(local()),
            remote_endpoint: Some(remote()),
            ..Default::default()
        });
        assert_eq!(span.annotations.len(), 2);
        assert_eq!(span.annotations[0].value, CLIENT_SEND);
        assert_eq!(span.annotations[0].timestamp, 100);
        assert_eq!(
            span.annotations[0].host.as_ref().unwrap().service_name,
            "lhs"
        );
        assert_eq!(span.annotations[1].value, CLIENT_RECV);
        assert_eq!(span.annotations[1].timestamp, 150);

        assert_eq!(span.binary_annotations.len(), 1);
        let address = &span.binary_annotations[0];
        assert_eq!(address.key, SERVER_ADDR);
        assert_eq!(address.annotation_type, AnnotationType::Bool);
        assert_eq!(address.host.as_ref().unwrap().service_name, "rhs");
    }

    #[test]
    fn server_kind_synthesizes_sr_ss_and_ca() {
        let span = into_v1_span(V2Span {
            kind: Some(Kind::Server),
            timestamp: Some(10),
            duration: Some(5),
            local_endpoint: Some(local()),
            remote_endpoint: Some(remote()),
            ..Default::default()
        });
        let values: Vec<&str> = span.annotations.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, [SERVER_RECV, SERVER_SEND]);
        assert_eq!(span.binary_annotations[0].key, CLIENT_ADDR);
    }

    #[test]
    fn producer_and_consumer_get_single_annotations() {
        let producer = into_v1_span(V2Span {
            kind: Some(Kind::Producer),
            timestamp: Some(7),
            remote_endpoint: Some(remote()),
            ..Default::default()
        });
        assert_eq!(producer.annotations.len(), 1);
        assert_eq!(producer.annotations[0].value, MESSAGE_SEND);
        assert_eq!(producer.binary_annotations[0].key, MESSAGE_ADDR);

        let consumer = into_v1_span(V2Span {
            kind: Some(Kind::Consumer),
            timestamp: Some(7),
            ..Default::default()
        });
        assert_eq!(consumer.annotations[0].value, MESSAGE_RECV);
    }

    #[test]
    fn unspecified_kind_omits_address_annotation() {
        let span = into_v1_span(V2Span {
            remote_endpoint: Some(remote()),
            tags: vec![("a".to_owned(), "b".to_owned())],
            ..Default::default()
        });
        assert!(span.annotations.is_empty());
        assert_eq!(span.binary_annotations.len(), 1);
        assert_eq!(span.binary_annotations[0].key, "a");
    }

    #[test]
    fn tags_become_string_binary_annotations_in_order() {
        let span = into_v1_span(V2Span {
            local_endpoint: Some(local()),
            tags: vec![
                ("z".to_owned(), "1".to_owned()),
                ("a".to_owned(), "2".to_owned()),
            ],
            ..Default::default()
        });
        let keys: Vec<&str> = span
            .binary_annotations
            .iter()
            .map(|b| b.key.as_str())
            .collect();
        assert_eq!(keys, ["z", "a"]);
        assert_eq!(span.binary_annotations[0].value, b"1");
        assert_eq!(
            span.binary_annotations[0].host.as_ref().unwrap().service_name,
            "lhs"
        );
    }

    #[test]
    fn bare_local_endpoint_gets_lc_fallback() {
        let span = into_v1_span(V2Span {
            local_endpoint: Some(local()),
            ..Default::default()
        });
        assert_eq!(span.binary_annotations.len(), 1);
        let lc = &span.binary_annotations[0];
        assert_eq!(lc.key, LOCAL_COMPONENT);
        assert!(lc.value.is_empty());
        assert_eq!(lc.annotation_type, AnnotationType::String);
        assert_eq!(lc.host.as_ref().unwrap().service_name, "lhs");
    }
}
