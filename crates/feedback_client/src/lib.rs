//! HTTP transport for the anonymous feedback service.

mod http;

pub use http::HttpBackend;
