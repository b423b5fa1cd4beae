//! Native Jaeger Thrift batch format for the spangate collector.
//!
//! A batch bundles one [`Process`] with the spans it emitted; the
//! process is stamped onto every canonical span during conversion.
//! Decoding is pure; transports and RPC framing are the intake layer's
//! concern.

mod convert;
mod model;

pub use convert::batch_to_canonical;
pub use model::{
    decode_batch, encode_batch, Batch, BatchSubmitResponse, Log, Process, Span, SpanRef,
    SpanRefType, Tag, TagType,
};

use thiserror::Error;

/// Errors produced while decoding Jaeger Thrift payloads.
#[derive(Error, Debug)]
pub enum JaegerError {
    /// The payload did not deserialize as a Thrift batch.
    #[error("{0}")]
    Thrift(#[from] thrift::Error),
}
