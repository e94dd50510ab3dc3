//! Generated protobuf/gRPC bindings, compiled from `proto/schedula.proto` by
//! `build.rs` at build time.

tonic::include_proto!("schedula.v1");
