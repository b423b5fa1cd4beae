use thiserror::Error;

/// Errors produced while decoding Zipkin payloads.
///
/// Display strings are part of the collector's HTTP surface: intake
/// handlers echo them verbatim in error response bodies.
#[derive(Error, Debug)]
pub enum ZipkinError {
    /// A trace, span, or parent id was empty, mis-sized, or not hex.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// An IPv4 address string or byte field was malformed.
    #[error("wrong ipv4")]
    WrongIpv4,

    /// An IPv6 address string or byte field was malformed.
    #[error("wrong ipv6")]
    WrongIpv6,

    /// A BYTES binary annotation carried invalid base64.
    #[error("bad binary annotation value: {0}")]
    BadBinary(#[from] base64::DecodeError),

    /// The payload did not deserialize as the selected wire format.
    #[error("{0}")]
    Format(String),
}

impl From<spangate_model::ParseIdError> for ZipkinError {
    fn from(err: spangate_model::ParseIdError) -> Self {
        ZipkinError::InvalidId(err.to_string())
    }
}

impl From<serde_json::Error> for ZipkinError {
    fn from(err: serde_json::Error) -> Self {
        ZipkinError::Format(err.to_string())
    }
}

impl From<thrift::Error> for ZipkinError {
    fn from(err: thrift::Error) -> Self {
        ZipkinError::Format(err.to_string())
    }
}

impl From<prost::DecodeError> for ZipkinError {
    fn from(err: prost::DecodeError) -> Self {
        ZipkinError::Format(err.to_string())
    }
}
