//! HTTP intake handlers.
//!
//! Handlers are transport-thin: they parse headers, decode the payload,
//! and offer canonical spans to the processor. Responses are plain text;
//! the wire contract is fire-and-forget, so a 202 acknowledges receipt,
//! not persistence.

use std::fmt::Display;
use std::io::Read as _;
use std::str::FromStr;

use bytes::Bytes;
use flate2::read::GzDecoder;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::{BodyExt as _, Full};
use metrics::{counter, histogram};
use mime::Mime;
use spangate_model::Span;
use thiserror::Error;

use crate::metrics::{BATCH_SIZE, SPANS_REJECTED};
use crate::processor::{SpanOrigin, SpanProcessor};

mod jaeger;
mod zipkin;

pub use jaeger::JaegerHandler;
pub use zipkin::ZipkinHandler;

/// Errors surfaced on the HTTP boundary. Display strings are the exact
/// response bodies (a trailing newline is appended at write-out).
#[derive(Error, Debug)]
pub(crate) enum IntakeError {
    /// The payload failed to decompress or decode. 400.
    #[error("Unable to process request body: {0}")]
    Body(String),
    /// The transport failed while reading the body. 500.
    #[error("Unable to process request body: {0}")]
    Read(String),
    /// The Content-Type header did not parse as a media type. 400.
    #[error("Cannot parse Content-Type: {0}")]
    ContentTypeParse(String),
    /// The media type is not accepted on this route. 400.
    #[error("Unsupported Content-Type")]
    ContentTypeUnsupported,
    /// The processor refused the batch outright. 500.
    #[error("Cannot submit Zipkin batch: {0}")]
    Submit(String),
}

impl IntakeError {
    fn status(&self) -> StatusCode {
        match self {
            IntakeError::Read(_) | IntakeError::Submit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

pub(crate) fn accepted() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::ACCEPTED)
        .body(Full::new(Bytes::new()))
        .expect("response should always be valid")
}

pub(crate) fn error_response(error: &IntakeError) -> Response<Full<Bytes>> {
    Response::builder()
        .status(error.status())
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("{error}\n"))))
        .expect("response should always be valid")
}

/// The normalized `type/subtype` of the request's Content-Type header.
pub(crate) fn parse_content_type(headers: &HeaderMap) -> Result<String, IntakeError> {
    let value = headers
        .get(CONTENT_TYPE)
        .ok_or(IntakeError::ContentTypeUnsupported)?;
    let raw = value
        .to_str()
        .map_err(|error| IntakeError::ContentTypeParse(error.to_string()))?;
    let mime = Mime::from_str(raw)
        .map_err(|error| IntakeError::ContentTypeParse(error.to_string()))?;
    Ok(mime.essence_str().to_ascii_lowercase())
}

pub(crate) async fn collect_body<B>(body: B) -> Result<Bytes, IntakeError>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Display,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|error| IntakeError::Read(error.to_string()))
}

/// Apply the request's Content-Encoding. Only identity and gzip are
/// accepted; a gzip failure is the producer's fault, not the transport's.
pub(crate) fn decode_content(headers: &HeaderMap, body: Bytes) -> Result<Bytes, IntakeError> {
    let Some(value) = headers.get(CONTENT_ENCODING) else {
        return Ok(body);
    };
    match value.to_str() {
        Ok("identity") | Ok("") => Ok(body),
        Ok("gzip") => {
            let mut decoded = Vec::new();
            GzDecoder::new(body.as_ref())
                .read_to_end(&mut decoded)
                .map_err(|error| IntakeError::Body(error.to_string()))?;
            Ok(decoded.into())
        }
        _ => Err(IntakeError::Body("unsupported content encoding".to_owned())),
    }
}

/// Offer every span of an accepted batch to the processor. Per-span
/// rejections are counted but do not fail the batch.
pub(crate) fn accept_spans(
    processor: &SpanProcessor,
    spans: Vec<Span>,
    origin: SpanOrigin,
) -> Result<(), IntakeError> {
    if processor.is_closed() {
        return Err(IntakeError::Submit("span processor is closed".to_owned()));
    }
    histogram!(BATCH_SIZE, "format" => origin.as_label()).record(spans.len() as f64);
    for span in spans {
        let service = span.process.service_name.clone();
        if !processor.enqueue(span, origin) {
            counter!(
                SPANS_REJECTED,
                "service" => service,
                "format" => origin.as_label()
            )
            .increment(1);
        }
    }
    Ok(())
}
