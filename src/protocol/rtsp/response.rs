use super::headers::{names, Headers};

/// RTSP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// 200
    pub const OK: StatusCode = StatusCode(200);
    /// 401, password required or wrong
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    /// 453, receiver already claimed by another sender
    pub const NOT_ENOUGH_BANDWIDTH: StatusCode = StatusCode(453);

    /// 2xx
    #[must_use]
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Raw value
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// A parsed RTSP response
#[derive(Debug, Clone)]
pub struct RtspResponse {
    /// Status code from the status line
    pub status: StatusCode,
    /// Reason phrase from the status line
    pub reason: String,
    /// Response headers
    pub headers: Headers,
    /// Response body, possibly empty
    pub body: Vec<u8>,
}

impl RtspResponse {
    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// `Session` header with any parameters stripped
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.headers.session()
    }

    /// Shorthand for a header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// `Audio-Latency` parsed as frames
    #[must_use]
    pub fn audio_latency(&self) -> Option<u32> {
        self.headers.get(names::AUDIO_LATENCY)?.trim().parse().ok()
    }
}
