use super::headers::{names, Headers};

/// RTSP methods the engine issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Capability probe, carries `Apple-Challenge`
    Options,
    /// Stream description (SDP body)
    Announce,
    /// UDP transport negotiation
    Setup,
    /// Start of streaming
    Record,
    /// Volume, progress, metadata, artwork
    SetParameter,
    /// Drop buffered audio on pause
    Flush,
    /// End of session
    Teardown,
    /// Rogue-Amoeba album art extension
    XRaSetAlbumArt,
}

impl Method {
    /// Wire name of the method
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Announce => "ANNOUNCE",
            Self::Setup => "SETUP",
            Self::Record => "RECORD",
            Self::SetParameter => "SET_PARAMETER",
            Self::Flush => "FLUSH",
            Self::Teardown => "TEARDOWN",
            Self::XRaSetAlbumArt => "X_RA_SET_ALBUM_ART",
        }
    }
}

/// An outgoing RTSP request
#[derive(Debug, Clone)]
pub struct RtspRequest {
    /// Request method
    pub method: Method,
    /// Request URI (`rtsp://{local_ip}/{session_id}`, or `*` for OPTIONS)
    pub uri: String,
    /// Request headers
    pub headers: Headers,
    /// Request body, possibly empty
    pub body: Vec<u8>,
}

impl RtspRequest {
    /// Start building a request
    #[must_use]
    pub fn builder(method: Method, uri: impl Into<String>) -> RtspRequestBuilder {
        RtspRequestBuilder {
            request: Self {
                method,
                uri: uri.into(),
                headers: Headers::new(),
                body: Vec::new(),
            },
        }
    }

    /// Serialize for transmission.
    ///
    /// `Content-Length` is appended automatically when a body is present.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(self.method.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.uri.as_bytes());
        out.extend_from_slice(b" RTSP/1.0\r\n");

        for (name, value) in self.headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        if !self.body.is_empty() {
            out.extend_from_slice(
                format!("{}: {}\r\n", names::CONTENT_LENGTH, self.body.len()).as_bytes(),
            );
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Builder for [`RtspRequest`]
#[derive(Debug)]
pub struct RtspRequestBuilder {
    request: RtspRequest,
}

impl RtspRequestBuilder {
    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    /// Set the `CSeq` header
    #[must_use]
    pub fn cseq(self, seq: u32) -> Self {
        self.header(names::CSEQ, seq.to_string())
    }

    /// Set the `Content-Type` header
    #[must_use]
    pub fn content_type(self, mime: &str) -> Self {
        self.header(names::CONTENT_TYPE, mime)
    }

    /// Set the body
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.request.body = body;
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> RtspRequest {
        self.request
    }
}
