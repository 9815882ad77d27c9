//! Incremental, sans-IO RTSP response parsing

use bytes::BytesMut;
use thiserror::Error;

use super::headers::Headers;
use super::response::{RtspResponse, StatusCode};

/// Errors from response parsing
#[derive(Debug, Error)]
pub enum ResponseParseError {
    /// Status line was not `RTSP/x.y CODE reason`
    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    /// A header line had no colon
    #[error("invalid header line: {0}")]
    InvalidHeader(String),

    /// Headers plus body exceeded the parser's limit
    #[error("response exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit
        limit: usize,
    },
}

/// Accumulates TCP bytes and yields complete [`RtspResponse`]s.
///
/// Feed whatever the socket produced with [`feed`](Self::feed), then
/// drain completed responses with [`poll`](Self::poll).
#[derive(Debug)]
pub struct ResponseParser {
    buffer: BytesMut,
    max_size: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Default maximum buffered response size (1 MiB)
    pub const DEFAULT_MAX_SIZE: usize = 1024 * 1024;

    /// Create a parser with the default size limit
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_size: Self::DEFAULT_MAX_SIZE,
        }
    }

    /// Append bytes read from the transport
    ///
    /// # Errors
    ///
    /// Returns [`ResponseParseError::TooLarge`] when the buffered data
    /// would exceed the size limit.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), ResponseParseError> {
        if self.buffer.len() + bytes.len() > self.max_size {
            return Err(ResponseParseError::TooLarge {
                limit: self.max_size,
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Try to extract one complete response.
    ///
    /// Returns `Ok(None)` until enough bytes have been fed.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseParseError`] when the buffered bytes are not a
    /// valid RTSP response.
    pub fn poll(&mut self) -> Result<Option<RtspResponse>, ResponseParseError> {
        let Some(header_end) = find_double_crlf(&self.buffer) else {
            return Ok(None);
        };

        let head = String::from_utf8_lossy(&self.buffer[..header_end]).into_owned();
        let mut lines = head.split("\r\n");

        let status_line = lines.next().unwrap_or("");
        let (status, reason) = parse_status_line(status_line)?;

        let mut headers = Headers::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ResponseParseError::InvalidHeader(line.to_string()))?;
            headers.insert(name.trim(), value.trim());
        }

        let content_length = headers.content_length().unwrap_or(0);
        let total = header_end + 4 + content_length;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let mut message = self.buffer.split_to(total);
        let body = message.split_off(header_end + 4).to_vec();

        Ok(Some(RtspResponse {
            status,
            reason,
            headers,
            body,
        }))
    }

    /// Discard buffered bytes, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_line(line: &str) -> Result<(StatusCode, String), ResponseParseError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("RTSP/") {
        return Err(ResponseParseError::InvalidStatusLine(line.to_string()));
    }

    let code = parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| ResponseParseError::InvalidStatusLine(line.to_string()))?;

    Ok((StatusCode(code), parts.next().unwrap_or("").to_string()))
}
