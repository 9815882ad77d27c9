use std::time::Duration;

/// Payload codec for the audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamCodec {
    /// Apple Lossless, 352 frames per packet (the AirTunes default)
    #[default]
    Alac,
    /// Uncompressed big-endian 16-bit stereo PCM
    RawL16,
}

/// Engine configuration
///
/// The defaults reproduce stock AirTunes v2 behavior; the knobs exist
/// mostly for tests and for receivers with unusual timing.
#[derive(Debug, Clone)]
pub struct AirTunesConfig {
    /// Resendable packet history per session (default: 1000, about 8 s)
    pub backlog_size: usize,

    /// Frames between outbound sync packets (default: 44100, one second)
    pub timesync_interval_frames: u32,

    /// How long a paused stream keeps its sessions before TEARDOWN
    /// (default: 2 seconds)
    pub pause_teardown_timeout: Duration,

    /// Per-request RTSP timeout (default: 5 seconds)
    pub rtsp_request_timeout: Duration,

    /// Latency assumed when the receiver does not report a usable
    /// `Audio-Latency` (default: 11025 frames, 250 ms)
    pub default_latency_frames: u32,

    /// Preferred local audio port; the next free port is taken when bound
    /// (default: 6000)
    pub audio_port: u16,

    /// Preferred local control port (default: 6001)
    pub control_port: u16,

    /// Preferred local timing port (default: 6002)
    pub timing_port: u16,

    /// Audio payload codec (default: ALAC)
    pub codec: StreamCodec,

    /// `User-Agent` sent on every RTSP request
    pub user_agent: String,
}

impl Default for AirTunesConfig {
    fn default() -> Self {
        Self {
            backlog_size: 1000,
            timesync_interval_frames: 44_100,
            pause_teardown_timeout: Duration::from_secs(2),
            rtsp_request_timeout: Duration::from_secs(5),
            default_latency_frames: 11_025,
            audio_port: 6000,
            control_port: 6001,
            timing_port: 6002,
            codec: StreamCodec::default(),
            user_agent: "iTunes/7.6.2 (Windows; N;)".to_string(),
        }
    }
}

impl AirTunesConfig {
    /// Create a config builder
    #[must_use]
    pub fn builder() -> AirTunesConfigBuilder {
        AirTunesConfigBuilder::default()
    }
}

/// Builder for [`AirTunesConfig`]
#[derive(Debug, Clone, Default)]
pub struct AirTunesConfigBuilder {
    config: AirTunesConfig,
}

impl AirTunesConfigBuilder {
    /// Set the resend backlog size
    #[must_use]
    pub fn backlog_size(mut self, size: usize) -> Self {
        self.config.backlog_size = size;
        self
    }

    /// Set the sync interval in frames
    #[must_use]
    pub fn timesync_interval_frames(mut self, frames: u32) -> Self {
        self.config.timesync_interval_frames = frames;
        self
    }

    /// Set the paused-stream teardown timeout
    #[must_use]
    pub fn pause_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.config.pause_teardown_timeout = timeout;
        self
    }

    /// Set the per-request RTSP timeout
    #[must_use]
    pub fn rtsp_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.rtsp_request_timeout = timeout;
        self
    }

    /// Set the fallback audio latency in frames
    #[must_use]
    pub fn default_latency_frames(mut self, frames: u32) -> Self {
        self.config.default_latency_frames = frames;
        self
    }

    /// Set the preferred local UDP ports (audio, control, timing)
    #[must_use]
    pub fn udp_ports(mut self, audio: u16, control: u16, timing: u16) -> Self {
        self.config.audio_port = audio;
        self.config.control_port = control;
        self.config.timing_port = timing;
        self
    }

    /// Set the audio payload codec
    #[must_use]
    pub fn codec(mut self, codec: StreamCodec) -> Self {
        self.config.codec = codec;
        self
    }

    /// Set the RTSP `User-Agent`
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> AirTunesConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol_constants() {
        let config = AirTunesConfig::default();
        assert_eq!(config.backlog_size, 1000);
        assert_eq!(config.timesync_interval_frames, 44_100);
        assert_eq!(config.pause_teardown_timeout, Duration::from_secs(2));
        assert_eq!(config.rtsp_request_timeout, Duration::from_secs(5));
        assert_eq!(config.default_latency_frames, 11_025);
        assert_eq!(
            (config.audio_port, config.control_port, config.timing_port),
            (6000, 6001, 6002)
        );
        assert_eq!(config.codec, StreamCodec::Alac);
    }

    #[test]
    fn builder_overrides() {
        let config = AirTunesConfig::builder()
            .backlog_size(16)
            .pause_teardown_timeout(Duration::from_millis(200))
            .codec(StreamCodec::RawL16)
            .build();
        assert_eq!(config.backlog_size, 16);
        assert_eq!(config.pause_teardown_timeout, Duration::from_millis(200));
        assert_eq!(config.codec, StreamCodec::RawL16);
    }
}
