use std::io;
use thiserror::Error;

/// Errors raised by the AirTunes engine
#[derive(Debug, Error)]
pub enum AirTunesError {
    /// A UDP datagram failed length or payload-type validation.
    ///
    /// These are dropped and counted by the receiving endpoint; they only
    /// surface through APIs that decode caller-supplied bytes.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// The receiver demands credentials we do not have, or rejected the
    /// ones we computed twice in a row.
    #[error("authentication required by {device}: {message}")]
    AuthRequired {
        /// Name or address of the receiver
        device: String,
        /// Description of the failure
        message: String,
    },

    /// The receiver answered an RTSP request with an unexpected status.
    #[error("RTSP error: {message}")]
    RtspProtocol {
        /// Description of the error
        message: String,
        /// RTSP status code if one was received
        status_code: Option<u16>,
    },

    /// An RTSP request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// TCP reset, connection refused, or the peer otherwise unreachable.
    #[error("transport down: {0}")]
    TransportDown(String),

    /// The receiver requires encryption but no key material was provided,
    /// or the other way around.
    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),

    /// Codec or cipher failure; kills the stream.
    #[error("fatal internal error: {0}")]
    FatalInternal(String),

    /// Operation is not valid in the controller's current state.
    #[error("invalid state: {message} (currently {current})")]
    InvalidState {
        /// What was attempted
        message: String,
        /// The state the controller is in
        current: String,
    },

    /// Every session in the group has failed or been removed.
    #[error("no receivers remain in the group")]
    GroupEmpty,

    /// Network I/O error
    #[error("network error: {0}")]
    Io(#[from] io::Error),
}

impl AirTunesError {
    /// Whether the containing group should keep playing on its remaining
    /// sessions after one session fails with this error.
    #[must_use]
    pub fn is_session_local(&self) -> bool {
        matches!(
            self,
            Self::AuthRequired { .. }
                | Self::RtspProtocol { .. }
                | Self::Timeout
                | Self::TransportDown(_)
                | Self::CapabilityMismatch(_)
                | Self::Io(_)
        )
    }

    /// Whether a single reconnect attempt is worthwhile.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout | Self::TransportDown(_) | Self::Io(_))
    }
}

/// Result type alias for AirTunes operations
pub type Result<T> = std::result::Result<T, AirTunesError>;
