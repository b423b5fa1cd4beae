//! Zipkin wire formats for the spangate collector.
//!
//! Payloads decode into [`zipkincore`], the v1 in-memory model, then
//! translate into canonical spans:
//!
//! ```ascii
//!   v1 Thrift ──┐
//!   v1 JSON  ───┤
//!               ├──> zipkincore::Span ──Translator──> spangate_model::Span
//!   v2 JSON  ───┤          (v1 model)
//!   v2 Proto ───┘
//! ```
//!
//! v2 payloads are first rewritten in v1 terms (span kind and remote
//! endpoint become core and address annotations), so every format shares
//! one translation path. All decoding is pure; the collector's intake
//! layer owns every I/O concern.

mod endpoint;
mod error;
mod json_v1;
mod json_v2;
#[rustfmt::skip]
#[allow(warnings)]
#[doc(hidden)]
mod proto;
mod proto_v2;
mod translator;
mod v2;
pub mod zipkincore;

pub use error::ZipkinError;
pub use json_v1::{decode_json_v1, encode_json_v1};
pub use json_v2::decode_json_v2;
pub use proto_v2::decode_proto_v2;
pub use translator::{
    from_canonical, Translator, COMPONENT_TAG, EVENT_LOG_FIELD, PEER_IPV4_TAG, PEER_IPV6_TAG,
    PEER_PORT_TAG, PEER_SERVICE_TAG, PROCESS_IP_TAG, SPAN_KIND_TAG,
};
pub use zipkincore::{decode_span_list as decode_thrift_v1, encode_span_list as encode_thrift_v1};

use spangate_model::Span;

/// Serialize canonical spans as a Zipkin v1 JSON array.
pub fn encode_canonical_json_v1(spans: &[Span]) -> Result<Vec<u8>, ZipkinError> {
    let v1: Vec<zipkincore::Span> = spans.iter().map(from_canonical).collect();
    encode_json_v1(&v1)
}
