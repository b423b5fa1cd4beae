//! Zipkin v1/v2 HTTP intake.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use spangate_zipkin::{zipkincore, Translator, ZipkinError};
use tracing::debug;

use super::{
    accept_spans, accepted, collect_body, decode_content, error_response, parse_content_type,
    IntakeError,
};
use crate::processor::{SpanOrigin, SpanProcessor};

type WireDecoder = fn(&[u8]) -> Result<Vec<zipkincore::Span>, ZipkinError>;

// Media-type dispatch tables, one per route.
const V1_DECODERS: &[(&str, WireDecoder)] = &[
    ("application/x-thrift", spangate_zipkin::decode_thrift_v1),
    ("application/json", spangate_zipkin::decode_json_v1),
];
const V2_DECODERS: &[(&str, WireDecoder)] = &[
    ("application/json", spangate_zipkin::decode_json_v2),
    ("application/x-protobuf", spangate_zipkin::decode_proto_v2),
];

/// Handles `POST /api/v1/spans` and `POST /api/v2/spans`.
#[derive(Debug)]
pub struct ZipkinHandler {
    processor: Arc<SpanProcessor>,
    translator: Translator,
}

impl ZipkinHandler {
    /// A handler feeding the given processor with default translation.
    pub fn new(processor: Arc<SpanProcessor>) -> Self {
        ZipkinHandler {
            processor,
            translator: Translator::new(),
        }
    }

    /// Replace the translator, e.g. to enable legacy inference.
    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    /// Serve a v1 submission.
    pub async fn handle_v1<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        match self.process(req, V1_DECODERS, SpanOrigin::ZipkinV1).await {
            Ok(()) => accepted(),
            Err(error) => {
                debug!(%error, "rejected v1 span submission");
                error_response(&error)
            }
        }
    }

    /// Serve a v2 submission.
    pub async fn handle_v2<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        match self.process(req, V2_DECODERS, SpanOrigin::ZipkinV2).await {
            Ok(()) => accepted(),
            Err(error) => {
                debug!(%error, "rejected v2 span submission");
                error_response(&error)
            }
        }
    }

    // Parse-everything-then-enqueue: one bad span rejects the whole
    // batch with nothing enqueued.
    async fn process<B>(
        &self,
        req: Request<B>,
        decoders: &[(&str, WireDecoder)],
        origin: SpanOrigin,
    ) -> Result<(), IntakeError>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let media_type = parse_content_type(&parts.headers)?;
        let decoder = decoders
            .iter()
            .find(|(candidate, _)| *candidate == media_type)
            .map(|(_, decoder)| *decoder)
            .ok_or(IntakeError::ContentTypeUnsupported)?;

        let body = collect_body(body).await?;
        let body = decode_content(&parts.headers, body)?;
        let wire_spans = decoder(&body).map_err(|error| IntakeError::Body(error.to_string()))?;
        let spans = self.translator.to_canonical(&wire_spans);
        accept_spans(&self.processor, spans, origin)
    }
}
