/// Header names the engine reads or writes
pub mod names {
    /// Request sequence counter
    pub const CSEQ: &str = "CSeq";
    /// Body MIME type
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// Body length in bytes
    pub const CONTENT_LENGTH: &str = "Content-Length";
    /// Server-assigned session identifier
    pub const SESSION: &str = "Session";
    /// UDP transport negotiation
    pub const TRANSPORT: &str = "Transport";
    /// Client identification
    pub const USER_AGENT: &str = "User-Agent";
    /// 64-digit hex client instance id
    pub const CLIENT_INSTANCE: &str = "Client-Instance";
    /// DACP remote-control pairing id
    pub const DACP_ID: &str = "DACP-ID";
    /// DACP remote-control token
    pub const ACTIVE_REMOTE: &str = "Active-Remote";
    /// Random challenge proving the receiver is genuine Apple hardware
    pub const APPLE_CHALLENGE: &str = "Apple-Challenge";
    /// Signed answer to `Apple-Challenge`
    pub const APPLE_RESPONSE: &str = "Apple-Response";
    /// Receiver software identification
    pub const SERVER: &str = "Server";
    /// Receiver-reported playback latency in frames
    pub const AUDIO_LATENCY: &str = "Audio-Latency";
    /// Analog/digital/unplugged jack state
    pub const AUDIO_JACK_STATUS: &str = "Audio-Jack-Status";
    /// Playback range for RECORD
    pub const RANGE: &str = "Range";
    /// seq/rtptime anchor for RECORD, FLUSH and metadata
    pub const RTP_INFO: &str = "RTP-Info";
    /// Digest challenge from the receiver
    pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";
    /// Digest answer from us
    pub const AUTHORIZATION: &str = "Authorization";
}

/// Ordered, case-insensitive RTSP header collection.
///
/// Insertion order is preserved so encoded requests are stable; lookups
/// and replacement compare names case-insensitively per RTSP.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value for the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Look up a header value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parsed `CSeq` value
    #[must_use]
    pub fn cseq(&self) -> Option<u32> {
        self.get(names::CSEQ)?.trim().parse().ok()
    }

    /// Parsed `Content-Length` value
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.get(names::CONTENT_LENGTH)?.trim().parse().ok()
    }

    /// `Session` value with any `;timeout=` suffix stripped
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        let raw = self.get(names::SESSION)?;
        Some(raw.split(';').next().unwrap_or(raw).trim())
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of headers
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
