//! Receiver capability probing.
//!
//! Capabilities are derived once from the handshake responses and frozen
//! as an immutable snapshot for the session's lifetime.

use crate::protocol::rtsp::{names, RtspResponse};

/// How the receiver expects its audio payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// ALAC with AES-128-CBC applied to whole payload blocks
    EncryptedAlac,
    /// Plain ALAC
    UnencryptedAlac,
}

/// Channel a receiver accepts album art on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtChannel {
    /// No album art
    #[default]
    None,
    /// `SET_PARAMETER` with an image body
    Daap,
    /// Rogue-Amoeba `X_RA_SET_ALBUM_ART`
    Plist,
}

/// Channel a receiver accepts track metadata on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataChannel {
    /// No metadata
    #[default]
    None,
    /// `SET_PARAMETER` with `application/x-dmap-tagged`
    Daap,
}

/// What is plugged into the receiver's audio jack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerKind {
    /// No `Audio-Jack-Status` header seen
    #[default]
    Unknown,
    /// Jack reported disconnected
    Unplugged,
    /// Analog output
    Analog,
    /// Digital (optical) output
    Digital,
}

impl SpeakerKind {
    /// Classify an `Audio-Jack-Status` value, e.g.
    /// `connected; type=digital`
    #[must_use]
    pub fn from_jack_status(value: Option<&str>) -> Self {
        match value {
            None => Self::Unknown,
            Some(v) if v.trim_start().starts_with("disconnected") => Self::Unplugged,
            Some(v) if v.contains("digital") => Self::Digital,
            Some(_) => Self::Analog,
        }
    }
}

/// Immutable capability snapshot for one receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Payload format the receiver expects
    pub audio_format: AudioFormat,
    /// Album-art channel
    pub wants_album_art: ArtChannel,
    /// Track-metadata channel
    pub wants_metadata: MetadataChannel,
    /// Whether progress updates are welcome
    pub wants_progress: bool,
    /// Whether Digest passwords are hashed lowercased
    pub lowercase_password: bool,
    /// Whether the receiver's `Audio-Latency` value is garbage
    pub has_bad_latency_header: bool,
    /// Playback latency in frames
    pub audio_latency_frames: u32,
}

impl Capabilities {
    /// Derive the snapshot from the OPTIONS response.
    ///
    /// Legacy Apple hardware answers `Apple-Challenge` with an
    /// `Apple-Response` and expects encrypted audio; third-party
    /// receivers identify through `Server` and take DAAP extras, but
    /// their `Audio-Latency` header cannot be trusted. When both headers
    /// show up, `Apple-Response` wins for the format and the extras
    /// while the `Server` quirks stay in force.
    #[must_use]
    pub fn derive(options_response: &RtspResponse, default_latency_frames: u32) -> Self {
        let apple = options_response.headers.contains(names::APPLE_RESPONSE);
        let server = options_response.headers.contains(names::SERVER);
        let third_party_extras = server && !apple;

        Self {
            audio_format: if apple {
                AudioFormat::EncryptedAlac
            } else {
                AudioFormat::UnencryptedAlac
            },
            wants_album_art: if third_party_extras {
                ArtChannel::Daap
            } else {
                ArtChannel::None
            },
            wants_metadata: if third_party_extras {
                MetadataChannel::Daap
            } else {
                MetadataChannel::None
            },
            wants_progress: third_party_extras,
            lowercase_password: server,
            has_bad_latency_header: server,
            audio_latency_frames: default_latency_frames,
        }
    }

    /// Resolve the latency from a RECORD response's `Audio-Latency`.
    ///
    /// Receivers with the bad-header quirk get the 11025-frame default
    /// no matter what they reported.
    pub fn resolve_latency(&mut self, reported: Option<u32>, default_latency_frames: u32) {
        self.audio_latency_frames = match reported {
            Some(value) if !self.has_bad_latency_header => value,
            _ => default_latency_frames,
        };
    }

    /// Whether payloads must be AES-encrypted
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.audio_format == AudioFormat::EncryptedAlac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::rtsp::{Headers, ResponseParser, StatusCode};

    const DEFAULT_LATENCY: u32 = 11_025;

    fn response_with(headers: &[(&str, &str)]) -> RtspResponse {
        let mut h = Headers::new();
        for (name, value) in headers {
            h.insert(*name, *value);
        }
        RtspResponse {
            status: StatusCode::OK,
            reason: "OK".into(),
            headers: h,
            body: Vec::new(),
        }
    }

    #[test]
    fn apple_response_means_encrypted_and_plain() {
        let caps = Capabilities::derive(
            &response_with(&[("Apple-Response", "c2ln")]),
            DEFAULT_LATENCY,
        );

        assert_eq!(caps.audio_format, AudioFormat::EncryptedAlac);
        assert_eq!(caps.wants_album_art, ArtChannel::None);
        assert_eq!(caps.wants_metadata, MetadataChannel::None);
        assert!(!caps.wants_progress);
        assert!(!caps.lowercase_password);
        assert!(!caps.has_bad_latency_header);
    }

    #[test]
    fn server_only_means_third_party_with_daap_extras() {
        let caps = Capabilities::derive(
            &response_with(&[("Server", "AirTunes/105.1")]),
            DEFAULT_LATENCY,
        );

        assert_eq!(caps.audio_format, AudioFormat::UnencryptedAlac);
        assert_eq!(caps.wants_album_art, ArtChannel::Daap);
        assert_eq!(caps.wants_metadata, MetadataChannel::Daap);
        assert!(caps.wants_progress);
        assert!(caps.lowercase_password);
        assert!(caps.has_bad_latency_header);
    }

    #[test]
    fn both_headers_apple_wins_format_server_keeps_quirks() {
        let caps = Capabilities::derive(
            &response_with(&[("Apple-Response", "c2ln"), ("Server", "AirTunes/105.1")]),
            DEFAULT_LATENCY,
        );

        assert_eq!(caps.audio_format, AudioFormat::EncryptedAlac);
        assert_eq!(caps.wants_album_art, ArtChannel::None);
        assert_eq!(caps.wants_metadata, MetadataChannel::None);
        assert!(!caps.wants_progress);
        assert!(caps.lowercase_password);
        assert!(caps.has_bad_latency_header);
    }

    #[test]
    fn neither_header_is_a_plain_unencrypted_receiver() {
        let caps = Capabilities::derive(&response_with(&[]), DEFAULT_LATENCY);
        assert_eq!(caps.audio_format, AudioFormat::UnencryptedAlac);
        assert!(!caps.lowercase_password);
        assert!(!caps.has_bad_latency_header);
        assert_eq!(caps.audio_latency_frames, DEFAULT_LATENCY);
    }

    #[test]
    fn bad_latency_header_is_ignored_entirely() {
        let mut caps = Capabilities::derive(
            &response_with(&[("Server", "AirTunes/105.1")]),
            DEFAULT_LATENCY,
        );
        caps.resolve_latency(Some(322), DEFAULT_LATENCY);
        assert_eq!(caps.audio_latency_frames, 11_025);
    }

    #[test]
    fn good_latency_header_is_honored() {
        let mut caps = Capabilities::derive(
            &response_with(&[("Apple-Response", "c2ln")]),
            DEFAULT_LATENCY,
        );

        caps.resolve_latency(Some(11_025), DEFAULT_LATENCY);
        assert_eq!(caps.audio_latency_frames, 11_025);

        caps.resolve_latency(Some(500), DEFAULT_LATENCY);
        assert_eq!(caps.audio_latency_frames, 500);

        caps.resolve_latency(None, DEFAULT_LATENCY);
        assert_eq!(caps.audio_latency_frames, 11_025);
    }

    #[test]
    fn speaker_kind_classification() {
        assert_eq!(SpeakerKind::from_jack_status(None), SpeakerKind::Unknown);
        assert_eq!(
            SpeakerKind::from_jack_status(Some("disconnected")),
            SpeakerKind::Unplugged
        );
        assert_eq!(
            SpeakerKind::from_jack_status(Some("connected; type=digital")),
            SpeakerKind::Digital
        );
        assert_eq!(
            SpeakerKind::from_jack_status(Some("connected; type=analog")),
            SpeakerKind::Analog
        );
        assert_eq!(
            SpeakerKind::from_jack_status(Some("connected")),
            SpeakerKind::Analog
        );
    }

    #[test]
    fn derivation_from_parsed_wire_response() {
        let mut parser = ResponseParser::new();
        parser
            .feed(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nServer: AirTunes/105.1\r\n\r\n")
            .unwrap();
        let response = parser.poll().unwrap().unwrap();

        let caps = Capabilities::derive(&response, DEFAULT_LATENCY);
        assert_eq!(caps.audio_format, AudioFormat::UnencryptedAlac);
    }
}
