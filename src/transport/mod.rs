//! HTTP transport and response validation.

pub mod http;
pub mod validate;

pub use http::HttpTransport;
pub use validate::{checked_json, ResponseError};
