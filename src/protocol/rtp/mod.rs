//! AirTunes v2 RTP packet shapes and the resend backlog
//!
//! All multi-byte fields are big-endian with no alignment padding, per
//! the AirTunes 2 wire format.

pub mod backlog;
mod control;
mod packet;
mod sync;
mod timing;

#[cfg(test)]
mod packet_tests;

pub use backlog::{BacklogSlot, PacketBacklog};
pub use control::ResendRequest;
pub use packet::{AudioPacket, RtpDecodeError};
pub use sync::SyncPacket;
pub use timing::{TimingKind, TimingPacket};

/// RAOP payload types carried in the low 7 bits of header byte 1
pub mod payload_type {
    /// Timing request (receiver -> sender, timing port)
    pub const TIMING_REQUEST: u8 = 0x52;
    /// Timing response (sender -> receiver, timing port)
    pub const TIMING_RESPONSE: u8 = 0x53;
    /// Sync packet (sender -> receiver, control port)
    pub const SYNC: u8 = 0x54;
    /// Resend request (receiver -> sender, control port)
    pub const RESEND_REQUEST: u8 = 0x55;
    /// ALAC audio data
    pub const AUDIO: u8 = 0x60;
    /// Uncompressed L16 audio data
    pub const AUDIO_RAW: u8 = 0x0A;
}

/// Protocol constants shared by the pipeline and the controller
pub mod constants {
    /// Audio frames per RTP packet
    pub const FRAMES_PER_PACKET: u32 = 352;
    /// Sample rate; AirTunes v2 is always 44.1 kHz
    pub const SAMPLE_RATE: u32 = 44_100;
    /// Stereo
    pub const CHANNELS: u32 = 2;
    /// 16-bit samples
    pub const BITS_PER_SAMPLE: u32 = 16;
    /// One frame of interleaved L/R samples in bytes
    pub const FRAME_BYTES: usize = 4;
    /// PCM bytes per packet before encoding
    pub const PACKET_PCM_BYTES: usize = FRAMES_PER_PACKET as usize * FRAME_BYTES;
    /// Wall-clock nanoseconds per packet (352 / 44100 s, about 7.98 ms)
    pub const NANOS_PER_PACKET: u64 = 352_000_000_000 / SAMPLE_RATE as u64;
}
