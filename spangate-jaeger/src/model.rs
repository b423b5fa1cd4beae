//! In-memory model of the Jaeger Thrift wire format.
//!
//! Readers and writers mirror the layout of Apache Thrift generated
//! code (field-id match loop, skip on unknown fields) so the wire
//! behavior stays bit-compatible with stock Jaeger reporters.

use thrift::protocol::{
    field_id, TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TOutputProtocol, TStructIdentifier, TType,
};
use thrift::transport::{TBufferedReadTransport, TBufferedWriteTransport};

use crate::JaegerError;

/// The typed encoding of a [`Tag`] value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagType {
    /// UTF-8 string in `v_str`.
    #[default]
    String = 0,
    /// IEEE-754 double in `v_double`.
    Double = 1,
    /// Boolean in `v_bool`.
    Bool = 2,
    /// Signed 64-bit integer in `v_long`.
    Long = 3,
    /// Opaque bytes in `v_binary`.
    Binary = 4,
}

impl TryFrom<i32> for TagType {
    type Error = thrift::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TagType::String),
            1 => Ok(TagType::Double),
            2 => Ok(TagType::Bool),
            3 => Ok(TagType::Long),
            4 => Ok(TagType::Binary),
            _ => Err(thrift::Error::Protocol(thrift::ProtocolError::new(
                thrift::ProtocolErrorKind::InvalidData,
                format!("unknown tag type {value}"),
            ))),
        }
    }
}

/// A typed key/value pair; exactly one `v_*` field matches `v_type`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Which value field is populated.
    pub v_type: TagType,
    /// String value.
    pub v_str: Option<String>,
    /// Double value.
    pub v_double: Option<f64>,
    /// Boolean value.
    pub v_bool: Option<bool>,
    /// Integer value.
    pub v_long: Option<i64>,
    /// Binary value.
    pub v_binary: Option<Vec<u8>>,
}

/// A timestamped event with structured fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Log {
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    /// Event fields, ordering preserved as received.
    pub fields: Vec<Tag>,
}

/// How a [`SpanRef`] relates two spans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpanRefType {
    /// The referenced span is the parent.
    #[default]
    ChildOf = 0,
    /// The referenced span does not depend on this span's result.
    FollowsFrom = 1,
}

impl TryFrom<i32> for SpanRefType {
    type Error = thrift::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SpanRefType::ChildOf),
            1 => Ok(SpanRefType::FollowsFrom),
            _ => Err(thrift::Error::Protocol(thrift::ProtocolError::new(
                thrift::ProtocolErrorKind::InvalidData,
                format!("unknown span ref type {value}"),
            ))),
        }
    }
}

/// A causal reference to another span.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanRef {
    /// Relationship kind.
    pub ref_type: SpanRefType,
    /// Low 64 bits of the referenced trace id.
    pub trace_id_low: i64,
    /// High 64 bits of the referenced trace id.
    pub trace_id_high: i64,
    /// The referenced span.
    pub span_id: i64,
}

/// A Jaeger span.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    /// Low 64 bits of the trace id.
    pub trace_id_low: i64,
    /// High 64 bits of the trace id; zero for 64-bit trace ids.
    pub trace_id_high: i64,
    /// Span id.
    pub span_id: i64,
    /// Parent span id; zero for root spans.
    pub parent_span_id: i64,
    /// Name of the operation this span represents.
    pub operation_name: String,
    /// Causal references to other spans.
    pub references: Vec<SpanRef>,
    /// Flag word; bit 0 marks debug spans, bit 1 sampled spans.
    pub flags: i32,
    /// Span start, microseconds since the Unix epoch.
    pub start_time: i64,
    /// Span duration in microseconds.
    pub duration: i64,
    /// Span tags.
    pub tags: Vec<Tag>,
    /// Timestamped events.
    pub logs: Vec<Log>,
}

/// The process that emitted a batch of spans.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Process {
    /// Name of the emitting service.
    pub service_name: String,
    /// Process-level tags.
    pub tags: Vec<Tag>,
}

/// A submission unit: one process and the spans it emitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    /// The emitting process, stamped onto every span.
    pub process: Process,
    /// The spans to ingest.
    pub spans: Vec<Span>,
}

/// Per-batch acknowledgement returned to the submitting RPC layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSubmitResponse {
    /// Whether the batch was accepted for processing.
    pub ok: bool,
}

/// Decode a Thrift binary-protocol `Batch` payload.
pub fn decode_batch(bytes: &[u8]) -> Result<Batch, JaegerError> {
    let mut i_prot = TBinaryInputProtocol::new(TBufferedReadTransport::new(bytes), true);
    Ok(Batch::read_from_in_protocol(&mut i_prot)?)
}

/// Encode a `Batch` as a Thrift binary-protocol payload.
pub fn encode_batch(batch: &Batch) -> Result<Vec<u8>, JaegerError> {
    let mut buf = Vec::new();
    let mut o_prot = TBinaryOutputProtocol::new(TBufferedWriteTransport::new(&mut buf), true);
    batch.write_to_out_protocol(&mut o_prot)?;
    o_prot.flush()?;
    drop(o_prot);
    Ok(buf)
}

impl Tag {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<Tag> {
        i_prot.read_struct_begin()?;
        let mut tag = Tag::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => tag.key = i_prot.read_string()?,
                2 => tag.v_type = TagType::try_from(i_prot.read_i32()?)?,
                3 => tag.v_str = Some(i_prot.read_string()?),
                4 => tag.v_double = Some(i_prot.read_double()?),
                5 => tag.v_bool = Some(i_prot.read_bool()?),
                6 => tag.v_long = Some(i_prot.read_i64()?),
                7 => tag.v_binary = Some(i_prot.read_bytes()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(tag)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Tag"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("key", TType::String, 1))?;
        o_prot.write_string(&self.key)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("vType", TType::I32, 2))?;
        o_prot.write_i32(self.v_type as i32)?;
        o_prot.write_field_end()?;
        if let Some(v_str) = &self.v_str {
            o_prot.write_field_begin(&TFieldIdentifier::new("vStr", TType::String, 3))?;
            o_prot.write_string(v_str)?;
            o_prot.write_field_end()?;
        }
        if let Some(v_double) = self.v_double {
            o_prot.write_field_begin(&TFieldIdentifier::new("vDouble", TType::Double, 4))?;
            o_prot.write_double(v_double)?;
            o_prot.write_field_end()?;
        }
        if let Some(v_bool) = self.v_bool {
            o_prot.write_field_begin(&TFieldIdentifier::new("vBool", TType::Bool, 5))?;
            o_prot.write_bool(v_bool)?;
            o_prot.write_field_end()?;
        }
        if let Some(v_long) = self.v_long {
            o_prot.write_field_begin(&TFieldIdentifier::new("vLong", TType::I64, 6))?;
            o_prot.write_i64(v_long)?;
            o_prot.write_field_end()?;
        }
        if let Some(v_binary) = &self.v_binary {
            o_prot.write_field_begin(&TFieldIdentifier::new("vBinary", TType::String, 7))?;
            o_prot.write_bytes(v_binary)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl Log {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<Log> {
        i_prot.read_struct_begin()?;
        let mut log = Log::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => log.timestamp = i_prot.read_i64()?,
                2 => log.fields = read_struct_list(i_prot, Tag::read_from_in_protocol)?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(log)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Log"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("timestamp", TType::I64, 1))?;
        o_prot.write_i64(self.timestamp)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("fields", TType::List, 2))?;
        write_struct_list(o_prot, &self.fields, Tag::write_to_out_protocol)?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl SpanRef {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<SpanRef> {
        i_prot.read_struct_begin()?;
        let mut span_ref = SpanRef::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => span_ref.ref_type = SpanRefType::try_from(i_prot.read_i32()?)?,
                2 => span_ref.trace_id_low = i_prot.read_i64()?,
                3 => span_ref.trace_id_high = i_prot.read_i64()?,
                4 => span_ref.span_id = i_prot.read_i64()?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(span_ref)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("SpanRef"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("refType", TType::I32, 1))?;
        o_prot.write_i32(self.ref_type as i32)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdLow", TType::I64, 2))?;
        o_prot.write_i64(self.trace_id_low)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdHigh", TType::I64, 3))?;
        o_prot.write_i64(self.trace_id_high)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("spanId", TType::I64, 4))?;
        o_prot.write_i64(self.span_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl Span {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<Span> {
        i_prot.read_struct_begin()?;
        let mut span = Span::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => span.trace_id_low = i_prot.read_i64()?,
                2 => span.trace_id_high = i_prot.read_i64()?,
                3 => span.span_id = i_prot.read_i64()?,
                4 => span.parent_span_id = i_prot.read_i64()?,
                5 => span.operation_name = i_prot.read_string()?,
                6 => span.references = read_struct_list(i_prot, SpanRef::read_from_in_protocol)?,
                7 => span.flags = i_prot.read_i32()?,
                8 => span.start_time = i_prot.read_i64()?,
                9 => span.duration = i_prot.read_i64()?,
                10 => span.tags = read_struct_list(i_prot, Tag::read_from_in_protocol)?,
                11 => span.logs = read_struct_list(i_prot, Log::read_from_in_protocol)?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(span)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Span"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdLow", TType::I64, 1))?;
        o_prot.write_i64(self.trace_id_low)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdHigh", TType::I64, 2))?;
        o_prot.write_i64(self.trace_id_high)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("spanId", TType::I64, 3))?;
        o_prot.write_i64(self.span_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("parentSpanId", TType::I64, 4))?;
        o_prot.write_i64(self.parent_span_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("operationName", TType::String, 5))?;
        o_prot.write_string(&self.operation_name)?;
        o_prot.write_field_end()?;
        if !self.references.is_empty() {
            o_prot.write_field_begin(&TFieldIdentifier::new("references", TType::List, 6))?;
            write_struct_list(o_prot, &self.references, SpanRef::write_to_out_protocol)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_begin(&TFieldIdentifier::new("flags", TType::I32, 7))?;
        o_prot.write_i32(self.flags)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("startTime", TType::I64, 8))?;
        o_prot.write_i64(self.start_time)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("duration", TType::I64, 9))?;
        o_prot.write_i64(self.duration)?;
        o_prot.write_field_end()?;
        if !self.tags.is_empty() {
            o_prot.write_field_begin(&TFieldIdentifier::new("tags", TType::List, 10))?;
            write_struct_list(o_prot, &self.tags, Tag::write_to_out_protocol)?;
            o_prot.write_field_end()?;
        }
        if !self.logs.is_empty() {
            o_prot.write_field_begin(&TFieldIdentifier::new("logs", TType::List, 11))?;
            write_struct_list(o_prot, &self.logs, Log::write_to_out_protocol)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl Process {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<Process> {
        i_prot.read_struct_begin()?;
        let mut process = Process::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => process.service_name = i_prot.read_string()?,
                2 => process.tags = read_struct_list(i_prot, Tag::read_from_in_protocol)?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(process)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Process"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("serviceName", TType::String, 1))?;
        o_prot.write_string(&self.service_name)?;
        o_prot.write_field_end()?;
        if !self.tags.is_empty() {
            o_prot.write_field_begin(&TFieldIdentifier::new("tags", TType::List, 2))?;
            write_struct_list(o_prot, &self.tags, Tag::write_to_out_protocol)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl Batch {
    fn read_from_in_protocol(i_prot: &mut dyn TInputProtocol) -> thrift::Result<Batch> {
        i_prot.read_struct_begin()?;
        let mut batch = Batch::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => batch.process = Process::read_from_in_protocol(i_prot)?,
                2 => batch.spans = read_struct_list(i_prot, Span::read_from_in_protocol)?,
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(batch)
    }

    fn write_to_out_protocol(&self, o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Batch"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("process", TType::Struct, 1))?;
        self.process.write_to_out_protocol(o_prot)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("spans", TType::List, 2))?;
        write_struct_list(o_prot, &self.spans, Span::write_to_out_protocol)?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

// The element count arrives from the network, so the vector grows
// incrementally rather than trusting it for an allocation.
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

fn write_struct_list<T>(
    o_prot: &mut dyn TOutputProtocol,
    elements: &[T],
    write_element: fn(&T, &mut dyn TOutputProtocol) -> thrift::Result<()>,
) -> thrift::Result<()> {
    o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, elements.len() as i32))?;
    for element in elements {
        write_element(element, o_prot)?;
    }
    o_prot.write_list_end()
}
