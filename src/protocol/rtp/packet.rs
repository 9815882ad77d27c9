//! RTP audio packet framing

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::payload_type;

/// Version 2, no padding, no CSRC
const VERSION_BITS: u8 = 0x80;
/// Extension flag in header byte 0
const EXTENSION_BIT: u8 = 0x10;
/// Marker flag in header byte 1
const MARKER_BIT: u8 = 0x80;

/// Errors from decoding RTP-family datagrams
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpDecodeError {
    /// Datagram shorter than the packet shape requires
    #[error("buffer too small: need {needed}, have {have}")]
    BufferTooSmall {
        /// Bytes the shape requires
        needed: usize,
        /// Bytes received
        have: usize,
    },

    /// Low 7 bits of header byte 1 name a different packet shape
    #[error("unexpected payload type {actual:#04x}, expected {expected:#04x}")]
    UnexpectedPayloadType {
        /// Payload type the caller asked to decode
        expected: u8,
        /// Payload type found in the datagram
        actual: u8,
    },
}

impl From<RtpDecodeError> for crate::error::AirTunesError {
    fn from(e: RtpDecodeError) -> Self {
        match e {
            RtpDecodeError::BufferTooSmall { .. } => Self::MalformedPacket("datagram truncated"),
            RtpDecodeError::UnexpectedPayloadType { .. } => {
                Self::MalformedPacket("unexpected payload type")
            }
        }
    }
}

pub(crate) fn flags_first(first: bool) -> u8 {
    VERSION_BITS | if first { EXTENSION_BIT } else { 0 }
}

pub(crate) fn is_first(byte0: u8) -> bool {
    byte0 & EXTENSION_BIT != 0
}

pub(crate) fn payload_type_of(byte1: u8) -> u8 {
    byte1 & 0x7F
}

/// One RTP audio packet as sent on the audio channel.
///
/// `payload_type` is [`payload_type::AUDIO`] for ALAC streams and
/// [`payload_type::AUDIO_RAW`] for uncompressed L16 streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    /// Sequence number, monotonic mod 2^16
    pub sequence: u16,
    /// RTP timestamp, advancing 352 per packet mod 2^32
    pub timestamp: u32,
    /// Stream source identifier, constant for a stream
    pub ssrc: u32,
    /// Set on the first packet after connect or FLUSH
    pub marker: bool,
    /// Payload type (0x60 ALAC, 0x0A raw L16)
    pub payload_type: u8,
    /// Encoded (and possibly encrypted) audio bytes
    pub payload: Bytes,
}

impl AudioPacket {
    /// RTP header length in bytes
    pub const HEADER_SIZE: usize = 12;

    /// Encode into a wire datagram
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());
        buf.put_u8(VERSION_BITS);
        buf.put_u8(self.payload_type | if self.marker { MARKER_BIT } else { 0 });
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a wire datagram
    ///
    /// # Errors
    ///
    /// Returns [`RtpDecodeError`] when the datagram is shorter than the
    /// header or carries a non-audio payload type.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buf.len(),
            });
        }

        let pt = payload_type_of(buf[1]);
        if pt != payload_type::AUDIO && pt != payload_type::AUDIO_RAW {
            return Err(RtpDecodeError::UnexpectedPayloadType {
                expected: payload_type::AUDIO,
                actual: pt,
            });
        }

        Ok(Self {
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            marker: buf[1] & MARKER_BIT != 0,
            payload_type: pt,
            payload: Bytes::copy_from_slice(&buf[Self::HEADER_SIZE..]),
        })
    }
}
