//! Generated code from tonic-build.

tonic::include_proto!("relay");
