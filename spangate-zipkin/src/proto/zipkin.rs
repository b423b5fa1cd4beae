/// A list of spans with possibly different trace ids, in no particular
/// order. This is the message a reporter sends to a collector.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListOfSpans {
    #[prost(message, repeated, tag = "1")]
    pub spans: ::prost::alloc::vec::Vec<Span>,
}
/// A span is a single-host view of an operation. A trace is a series of
/// spans (often RPC calls) which nest to form a latency tree.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Span {
    /// Randomly generated, unique identifier for a trace, set on all
    /// spans within it. 16 bytes.
    #[prost(bytes = "vec", tag = "1")]
    pub trace_id: ::prost::alloc::vec::Vec<u8>,
    /// The parent span id, or absent if this is the root span in a
    /// trace. 8 bytes when present.
    #[prost(bytes = "vec", tag = "2")]
    pub parent_id: ::prost::alloc::vec::Vec<u8>,
    /// Unique identifier for this operation within the trace. 8 bytes.
    #[prost(bytes = "vec", tag = "3")]
    pub id: ::prost::alloc::vec::Vec<u8>,
    /// When present, kind clarifies timestamp, duration and remote_endpoint.
    #[prost(enumeration = "span::Kind", tag = "4")]
    pub kind: i32,
    /// The logical operation this span represents in lowercase.
    #[prost(string, tag = "5")]
    pub name: ::prost::alloc::string::String,
    /// Epoch microseconds of the start of this span, possibly absent.
    #[prost(fixed64, tag = "6")]
    pub timestamp: u64,
    /// Duration in microseconds of the critical path, if known.
    #[prost(uint64, tag = "7")]
    pub duration: u64,
    /// The host that recorded this span, primarily for query by service
    /// name.
    #[prost(message, optional, tag = "8")]
    pub local_endpoint: ::core::option::Option<Endpoint>,
    /// When an RPC (or messaging) span, indicates the other side of the
    /// connection.
    #[prost(message, optional, tag = "9")]
    pub remote_endpoint: ::core::option::Option<Endpoint>,
    /// Associates events that explain latency with the time they
    /// happened.
    #[prost(message, repeated, tag = "10")]
    pub annotations: ::prost::alloc::vec::Vec<Annotation>,
    /// Tags give this span context for search, viewing and analysis.
    /// Declared as a `map<string, string>` in the schema; map fields
    /// arrive as repeated entry messages, and keeping them repeated
    /// preserves the order they were received in.
    #[prost(message, repeated, tag = "11")]
    pub tags: ::prost::alloc::vec::Vec<TagEntry>,
    /// True is a request to store this span even if it overrides
    /// sampling policy.
    #[prost(bool, tag = "12")]
    pub debug: bool,
    /// True if we are contributing to a span started by another tracer
    /// (ex on a different host).
    #[prost(bool, tag = "13")]
    pub shared: bool,
}
/// Nested message and enum types in `Span`.
pub mod span {
    /// When present, used to interpret remote_endpoint.
    #[derive(
        Clone,
        Copy,
        Debug,
        PartialEq,
        Eq,
        Hash,
        PartialOrd,
        Ord,
        ::prost::Enumeration
    )]
    #[repr(i32)]
    pub enum Kind {
        /// Default value interpreted as absent.
        SpanKindUnspecified = 0,
        /// The span represents the client side of an RPC operation.
        Client = 1,
        /// The span represents the server side of an RPC operation.
        Server = 2,
        /// The span represents production of a message to a remote
        /// broker.
        Producer = 3,
        /// The span represents consumption of a message from a remote
        /// broker.
        Consumer = 4,
    }
    impl Kind {
        /// String value of the enum field names used in the ProtoBuf
        /// definition.
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Kind::SpanKindUnspecified => "SPAN_KIND_UNSPECIFIED",
                Kind::Client => "CLIENT",
                Kind::Server => "SERVER",
                Kind::Producer => "PRODUCER",
                Kind::Consumer => "CONSUMER",
            }
        }
    }
}
/// A single entry of the span `tags` map.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TagEntry {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}
/// The network context of a node in the service graph.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Endpoint {
    /// Lower-case label of this node in the service graph, such as
    /// "favstar".
    #[prost(string, tag = "1")]
    pub service_name: ::prost::alloc::string::String,
    /// 4 byte representation of the primary IPv4 address associated
    /// with this connection.
    #[prost(bytes = "vec", tag = "2")]
    pub ipv4: ::prost::alloc::vec::Vec<u8>,
    /// 16 byte representation of the primary IPv6 address associated
    /// with this connection.
    #[prost(bytes = "vec", tag = "3")]
    pub ipv6: ::prost::alloc::vec::Vec<u8>,
    /// Depending on context, this could be a listen port or the
    /// client-side of a socket.
    #[prost(int32, tag = "4")]
    pub port: i32,
}
/// Associates an event that explains latency with a timestamp.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Annotation {
    /// Epoch microseconds of this event.
    #[prost(fixed64, tag = "1")]
    pub timestamp: u64,
    /// Usually a short tag indicating an event, like "error".
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}
