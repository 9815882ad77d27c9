//! # airtunes2
//!
//! A pure Rust sender for the AirTunes v2 (RAOP) protocol.
//!
//! The crate drives the RTSP handshake against one or more AirPlay
//! receivers and streams a 44.1 kHz stereo PCM source as ALAC-packed,
//! optionally AES-encrypted RTP audio over the three AirTunes UDP
//! channels (audio, control/resend, timing), keeping every receiver
//! locked to a single logical playhead.
//!
//! ## Features
//!
//! - Full ANNOUNCE/SETUP/RECORD/SET_PARAMETER/FLUSH/TEARDOWN state machine
//! - Multi-receiver fan-out on one shared RTP clock
//! - Resend backlog serving receiver retransmit requests
//! - Outbound sync packets and inbound timing responses
//! - Volume, progress, DAAP metadata and album art surfaces
//!
//! ## Example
//!
//! ```rust,no_run
//! use airtunes2::{AirTunes, AirTunesConfig, RaopDevice, SilenceSource};
//!
//! # async fn example() -> airtunes2::Result<()> {
//! let device = RaopDevice::new("Living Room", "192.168.1.40:5000".parse().unwrap());
//!
//! let mut engine = AirTunes::new(AirTunesConfig::default());
//! engine.add_device(device);
//! engine.play(Box::new(SilenceSource::seconds(30))).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Error types
pub mod error;

/// Process-wide monotonic NTP/RTP clock
pub mod clock;

/// Configuration and receiver descriptions
pub mod types;

/// Wire formats: RTP, RTSP, SDP, DAAP, crypto
pub mod protocol;

/// PCM sources and the packet pipeline
pub mod audio;

/// Per-receiver session machinery
pub mod session;

/// Multi-receiver streaming controller
pub mod group;

/// Volume, progress and metadata surfaces
pub mod control;

#[cfg(test)]
mod testing;

pub use audio::{PcmSource, SilenceSource, VecSource};
pub use control::{TrackMetadata, Volume};
pub use error::{AirTunesError, Result};
pub use group::{AirTunes, PlaybackState};
pub use session::{Capabilities, SpeakerKind};
pub use types::{AirTunesConfig, RaopDevice, StreamCodec};
