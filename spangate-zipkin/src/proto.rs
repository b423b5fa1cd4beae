// Generated-format types for the Zipkin v2 protobuf schema. Kept in the
// shape emitted by prost codegen; edit with care and keep field tags in
// sync with the published schema.

pub mod zipkin;
