//! Native Jaeger batch intake.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use spangate_jaeger::{batch_to_canonical, decode_batch, Batch, BatchSubmitResponse};
use tracing::debug;

use super::{
    accept_spans, accepted, collect_body, decode_content, error_response, parse_content_type,
    IntakeError,
};
use crate::processor::{SpanOrigin, SpanProcessor};

const THRIFT_BINARY: &str = "application/vnd.apache.thrift.binary";

/// Handles `POST /api/traces` and programmatic batch submission from an
/// external RPC layer.
#[derive(Debug)]
pub struct JaegerHandler {
    processor: Arc<SpanProcessor>,
}

impl JaegerHandler {
    /// A handler feeding the given processor.
    pub fn new(processor: Arc<SpanProcessor>) -> Self {
        JaegerHandler { processor }
    }

    /// Serve a Thrift-binary batch submission.
    pub async fn handle_traces<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        match self.process(req).await {
            Ok(()) => accepted(),
            Err(error) => {
                debug!(%error, "rejected jaeger batch submission");
                error_response(&error)
            }
        }
    }

    /// Submit decoded batches, one acknowledgement per batch. Per-span
    /// queue rejections are counted but do not fail a batch.
    pub fn submit_batches(&self, batches: &[Batch]) -> Vec<BatchSubmitResponse> {
        batches
            .iter()
            .map(|batch| {
                let spans = batch_to_canonical(batch);
                let ok = accept_spans(&self.processor, spans, SpanOrigin::Jaeger).is_ok();
                BatchSubmitResponse { ok }
            })
            .collect()
    }

    async fn process<B>(&self, req: Request<B>) -> Result<(), IntakeError>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        if parse_content_type(&parts.headers)? != THRIFT_BINARY {
            return Err(IntakeError::ContentTypeUnsupported);
        }
        let body = collect_body(body).await?;
        let body = decode_content(&parts.headers, body)?;
        let batch = decode_batch(&body).map_err(|error| IntakeError::Body(error.to_string()))?;
        accept_spans(
            &self.processor,
            batch_to_canonical(&batch),
            SpanOrigin::Jaeger,
        )
    }
}
