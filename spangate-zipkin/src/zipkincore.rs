//! In-memory model of the Zipkin v1 wire format.
//!
//! Every v1 and v2 intake path funnels into these types before the
//! translation into canonical spans: Thrift payloads decode here
//! directly, v1 JSON payloads are lowered here by the JSON decoder, and
//! v2 payloads arrive through the kind-synthesis rewrite.
//!
//! The Thrift readers and writers mirror the layout of Apache Thrift
//! generated code (field-id match loop, skip on unknown fields) so the
//! wire behavior stays bit-compatible with stock Zipkin reporters.

use thrift::protocol::{
    field_id, TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TOutputProtocol, TStructIdentifier, TType,
};
use thrift::transport::{TBufferedReadTransport, TBufferedWriteTransport};

use crate::error::ZipkinError;

/// Client-send core annotation value.
pub const CLIENT_SEND: &str = "cs";
/// Client-receive core annotation value.
pub const CLIENT_RECV: &str = "cr";
/// Server-send core annotation value.
pub const SERVER_SEND: &str = "ss";
/// Server-receive core annotation value.
pub const SERVER_RECV: &str = "sr";
/// Message-send annotation value (producer spans).
pub const MESSAGE_SEND: &str = "ms";
/// Message-receive annotation value (consumer spans).
pub const MESSAGE_RECV: &str = "mr";

/// Local-component binary annotation key.
pub const LOCAL_COMPONENT: &str = "lc";
/// Client-address binary annotation key.
pub const CLIENT_ADDR: &str = "ca";
/// Server-address binary annotation key.
pub const SERVER_ADDR: &str = "sa";
/// Message-address binary annotation key.
pub const MESSAGE_ADDR: &str = "ma";

/// Whether `value` is one of the four client/server core annotations.
pub fn is_core_annotation(value: &str) -> bool {
    matches!(value, CLIENT_SEND | CLIENT_RECV | SERVER_SEND | SERVER_RECV)
}

/// The typed encoding of a [`BinaryAnnotation`] value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationType {
    /// Single byte, 0 or 1.
    Bool = 0,
    /// Opaque bytes.
    Bytes = 1,
    /// Little-endian 2-byte signed integer.
    I16 = 2,
    /// Little-endian 4-byte signed integer.
    I32 = 3,
    /// Little-endian 8-byte signed integer.
    I64 = 4,
    /// Little-endian IEEE-754 double.
    Double = 5,
    /// UTF-8 bytes.
    String = 6,
}

impl TryFrom<i32> for AnnotationType {
    type Error = thrift::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AnnotationType::Bool),
            1 => Ok(AnnotationType::Bytes),
            2 => Ok(AnnotationType::I16),
            3 => Ok(AnnotationType::I32),
            4 => Ok(AnnotationType::I64),
            5 => Ok(AnnotationType::Double),
            6 => Ok(AnnotationType::String),
            _ => Err(thrift::Error::Protocol(thrift::ProtocolError::new(
                thrift::ProtocolErrorKind::InvalidData,
                format!("unknown annotation type {value}"),
            ))),
        }
    }
}

/// The network context of an annotation: where it was recorded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Endpoint {
    /// IPv4 address packed big-endian into a signed 32-bit integer;
    /// zero when absent.
    pub ipv4: i32,
    /// Port with values above 32767 stored in two's complement; zero
    /// when absent. Readers widen negative values by 65536.
    pub port: i16,
    /// Lowercase service name, empty when unknown.
    pub service_name: String,
    /// Raw 16-byte IPv6 address, empty when absent.
    pub ipv6: Vec<u8>,
}

/// A timestamped event with the endpoint that recorded it.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    /// Event value; the core values are [`CLIENT_SEND`] and friends.
    pub value: String,
    /// Endpoint that recorded the event.
    pub host: Option<Endpoint>,
}

/// A typed key/value with the endpoint that recorded it.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryAnnotation {
    /// Annotation key.
    pub key: String,
    /// Value bytes, encoded per `annotation_type`.
    pub value: Vec<u8>,
    /// How `value` is encoded.
    pub annotation_type: AnnotationType,
    /// Endpoint that recorded the value.
    pub host: Option<Endpoint>,
}

/// A Zipkin v1 span.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    /// Low 64 bits of the trace id.
    pub trace_id: i64,
    /// High 64 bits of the trace id; zero for 64-bit trace ids.
    pub trace_id_high: i64,
    /// Span id.
    pub id: i64,
    /// Parent span id; `None` for root spans.
    pub parent_id: Option<i64>,
    /// Span name, lowercase.
    pub name: String,
    /// Timestamped events.
    pub annotations: Vec<Annotation>,
    /// Typed key/values.
    pub binary_annotations: Vec<BinaryAnnotation>,
    /// Debug flag, set by instrumented callers forcing collection.
    pub debug: bool,
    /// Span start, microseconds since the Unix epoch.
    pub timestamp: Option<i64>,
    /// Span duration in microseconds.
    pub duration: Option<i64>,
}

/// Decode a Thrift binary-protocol `list<Span>` payload.
///
/// Exactly the advertised number of elements is read, but the output
/// vector grows incrementally: the element count arrives from the
/// network and must not drive an allocation.
pub fn decode_span_list(bytes: &[u8]) -> Result<Vec<Span>, ZipkinError> {
    let mut i_prot = TBinaryInputProtocol::new(TBufferedReadTransport::new(bytes), true);
    let list_ident = i_prot.read_list_begin()?;
    if list_ident.element_type != TType::Struct || list_ident.size < 0 {
        return Err(ZipkinError::Format(format!(
            "malformed span list header: {:?} x {}",
            list_ident.element_type, list_ident.size
        )));
    }
    let mut spans = Vec::new();
    for _ in 0..list_ident.size {
        spans.push(Span::read_from_in_protocol(&mut i_prot)?);
    }
    i_prot.read_list_end()?;
    Ok(spans)
}

/// Encode spans as a Thrift binary-protocol `list<Span>` payload.
pub fn encode_span_list(spans: &[Span]) -> Result<Vec<u8>, ZipkinError> {
    let mut buf = Vec::new();
    let mut o_prot = TBinaryOutputProtocol::new(TBufferedWriteTransport::new(&mut buf), true);
    o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, spans.len() as i32))?;
    for span in spans {
        span.write_to_out_protocol(&mut o_prot)?;
    }
    o_prot.write_list_end()?;
    o_prot.flush()?;
    drop(o_prot);
    Ok(buf)
}

impl Endpoint {
    pub(crate) fn read_from_in_protocol(
        i_prot: &mut dyn TInputProtocol,
    ) -> thrift::Result<Endpoint> {
        i_prot.read_struct_begin()?;
        let mut endpoint = Endpoint::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => endpoint.ipv4 = i_prot.read_i32()?,
                2 => endpoint.port = i_prot.read_i16()?,
                3 => endpoint.service_name = i_prot.read_string()?,
                4 => endpoint.ipv6 = i_prot.read_bytes()?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(endpoint)
    }

    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Endpoint"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("ipv4", TType::I32, 1))?;
        o_prot.write_i32(self.ipv4)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("port", TType::I16, 2))?;
        o_prot.write_i16(self.port)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("service_name", TType::String, 3))?;
        o_prot.write_string(&self.service_name)?;
        o_prot.write_field_end()?;
        if !self.ipv6.is_empty() {
            o_prot.write_field_begin(&TFieldIdentifier::new("ipv6", TType::String, 4))?;
            o_prot.write_bytes(&self.ipv6)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl Annotation {
    pub(crate) fn read_from_in_protocol(
        i_prot: &mut dyn TInputProtocol,
    ) -> thrift::Result<Annotation> {
        i_prot.read_struct_begin()?;
        let mut timestamp = 0;
        let mut value = String::new();
        let mut host = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => timestamp = i_prot.read_i64()?,
                2 => value = i_prot.read_string()?,
                3 => host = Some(Endpoint::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(Annotation {
            timestamp,
            value,
            host,
        })
    }

    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Annotation"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("timestamp", TType::I64, 1))?;
        o_prot.write_i64(self.timestamp)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("value", TType::String, 2))?;
        o_prot.write_string(&self.value)?;
        o_prot.write_field_end()?;
        if let Some(host) = &self.host {
            o_prot.write_field_begin(&TFieldIdentifier::new("host", TType::Struct, 3))?;
            host.write_to_out_protocol(o_prot)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl BinaryAnnotation {
    pub(crate) fn read_from_in_protocol(
        i_prot: &mut dyn TInputProtocol,
    ) -> thrift::Result<BinaryAnnotation> {
        i_prot.read_struct_begin()?;
        let mut key = String::new();
        let mut value = Vec::new();
        let mut annotation_type = AnnotationType::String;
        let mut host = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => key = i_prot.read_string()?,
                2 => value = i_prot.read_bytes()?,
                3 => annotation_type = AnnotationType::try_from(i_prot.read_i32()?)?,
                4 => host = Some(Endpoint::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(BinaryAnnotation {
            key,
            value,
            annotation_type,
            host,
        })
    }

    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("BinaryAnnotation"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("key", TType::String, 1))?;
        o_prot.write_string(&self.key)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("value", TType::String, 2))?;
        o_prot.write_bytes(&self.value)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("annotation_type", TType::I32, 3))?;
        o_prot.write_i32(self.annotation_type as i32)?;
        o_prot.write_field_end()?;
        if let Some(host) = &self.host {
            o_prot.write_field_begin(&TFieldIdentifier::new("host", TType::Struct, 4))?;
            host.write_to_out_protocol(o_prot)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl Span {
    pub(crate) fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<Span> {
        i_prot.read_struct_begin()?;
        let mut span = Span::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => span.trace_id = i_prot.read_i64()?,
                3 => span.name = i_prot.read_string()?,
                4 => span.id = i_prot.read_i64()?,
                5 => span.parent_id = Some(i_prot.read_i64()?),
                6 => span.annotations = read_struct_list(i_prot, Annotation::read_from_in_protocol)?,
                8 => {
                    span.binary_annotations =
                        read_struct_list(i_prot, BinaryAnnotation::read_from_in_protocol)?
                }
                9 => span.debug = i_prot.read_bool()?,
                10 => span.timestamp = Some(i_prot.read_i64()?),
                11 => span.duration = Some(i_prot.read_i64()?),
                12 => span.trace_id_high = i_prot.read_i64()?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(span)
    }

    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Span"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("trace_id", TType::I64, 1))?;
        o_prot.write_i64(self.trace_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("name", TType::String, 3))?;
        o_prot.write_string(&self.name)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("id", TType::I64, 4))?;
        o_prot.write_i64(self.id)?;
        o_prot.write_field_end()?;
        if let Some(parent_id) = self.parent_id {
            o_prot.write_field_begin(&TFieldIdentifier::new("parent_id", TType::I64, 5))?;
            o_prot.write_i64(parent_id)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_begin(&TFieldIdentifier::new("annotations", TType::List, 6))?;
        o_prot.write_list_begin(&TListIdentifier::new(
            TType::Struct,
            self.annotations.len() as i32,
        ))?;
        for annotation in &self.annotations {
            annotation.write_to_out_protocol(o_prot)?;
        }
        o_prot.write_list_end()?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("binary_annotations", TType::List, 8))?;
        o_prot.write_list_begin(&TListIdentifier::new(
            TType::Struct,
            self.binary_annotations.len() as i32,
        ))?;
        for binary_annotation in &self.binary_annotations {
            binary_annotation.write_to_out_protocol(o_prot)?;
        }
        o_prot.write_list_end()?;
        o_prot.write_field_end()?;
        if self.debug {
            o_prot.write_field_begin(&TFieldIdentifier::new("debug", TType::Bool, 9))?;
            o_prot.write_bool(self.debug)?;
            o_prot.write_field_end()?;
        }
        if let Some(timestamp) = self.timestamp {
            o_prot.write_field_begin(&TFieldIdentifier::new("timestamp", TType::I64, 10))?;
            o_prot.write_i64(timestamp)?;
            o_prot.write_field_end()?;
        }
        if let Some(duration) = self.duration {
            o_prot.write_field_begin(&TFieldIdentifier::new("duration", TType::I64, 11))?;
            o_prot.write_i64(duration)?;
            o_prot.write_field_end()?;
        }
        if self.trace_id_high != 0 {
            o_prot.write_field_begin(&TFieldIdentifier::new("trace_id_high", TType::I64, 12))?;
            o_prot.write_i64(self.trace_id_high)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

fn read_struct_list<T>(
    i_prot: &mut dyn TInputProtocol,
    read_element: fn(&mut dyn TInputProtocol) -> thrift::Result<T>,
) -> thrift::Result<Vec<T>> {
    let list_ident = i_prot.read_list_begin()?;
    let mut elements = Vec::new();
    for _ in 0..list_ident.size {
        elements.push(read_element(i_prot)?);
    }
    i_prot.read_list_end()?;
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_span() -> Span {
        Span {
            trace_id: 0x1234,
            trace_id_high: 0x5678,
            id: 0x9abc,
            parent_id: Some(0x42),
            name: "get /things".to_owned(),
            annotations: vec![Annotation {
                timestamp: 1_500_000,
                value: CLIENT_SEND.to_owned(),
                host: Some(Endpoint {
                    ipv4: 0x7f000001,
                    port: 8080,
                    service_name: "frontend".to_owned(),
                    ipv6: Vec::new(),
                }),
            }],
            binary_annotations: vec![BinaryAnnotation {
                key: "http.status_code".to_owned(),
                value: 200i64.to_le_bytes().to_vec(),
                annotation_type: AnnotationType::I64,
                host: None,
            }],
            debug: true,
            timestamp: Some(1_500_000),
            duration: Some(2_000),
        }
    }

    #[test]
    fn span_list_round_trips_through_thrift() {
        let spans = vec![sample_span(), Span::default()];
        let bytes = encode_span_list(&spans).unwrap();
        let decoded = decode_span_list(&bytes).unwrap();
        assert_eq!(decoded, spans);
    }

    #[test]
    fn empty_list_decodes_empty() {
        let bytes = encode_span_list(&[]).unwrap();
        assert!(decode_span_list(&bytes).unwrap().is_empty());
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = encode_span_list(&[sample_span()]).unwrap();
        assert!(decode_span_list(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(decode_span_list(&[0xff; 16]).is_err());
    }

    #[test]
    fn oversized_advertised_count_fails_without_allocating() {
        // A list header promising i32::MAX structs followed by no data
        // must fail on the first missing element.
        let mut bytes = vec![0x0c];
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        assert!(decode_span_list(&bytes).is_err());
    }
}
