//! RTSP/1.0 message types, header collection, incremental response
//! parser, and HTTP Digest authentication

pub mod auth;
mod codec;
mod headers;
mod request;
mod response;


pub use codec::{ResponseParseError, ResponseParser};
pub use headers::{names, Headers};
pub use request::{Method, RtspRequest, RtspRequestBuilder};
pub use response::{RtspResponse, StatusCode};
