//! Sync packets, sent on the control channel roughly once a second

use bytes::{BufMut, BytesMut};

use super::packet::{flags_first, is_first, payload_type_of, RtpDecodeError};
use super::payload_type;
use crate::clock::NtpTime;

/// Marker bit plus payload type 0x54
const SYNC_BYTE1: u8 = 0xD4;

/// Sequence field of every sync packet; the value is literal in the
/// AirTunes 2 reference and its significance is unknown.
const SYNC_SEQ: u16 = 0x0007;

/// Pins the receiver's playback clock to ours.
///
/// `now` is the RTP timestamp of the next audio packet; the receiver
/// should be *playing* `now - latency` when the packet arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPacket {
    /// Extension bit; set at stream start and after every FLUSH, telling
    /// the receiver to reset its playback clock
    pub first: bool,
    /// `now` minus the session's audio latency in frames
    pub now_minus_latency: u32,
    /// NTP time of the previous sync emission (of this one, when `first`)
    pub time_last_sync: NtpTime,
    /// RTP timestamp of the next audio packet
    pub now: u32,
}

impl SyncPacket {
    /// Wire size in bytes
    pub const SIZE: usize = 20;

    /// Encode into a wire datagram
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(flags_first(self.first));
        buf.put_u8(SYNC_BYTE1);
        buf.put_u16(SYNC_SEQ);
        buf.put_u32(self.now_minus_latency);
        buf.put_slice(&self.time_last_sync.encode());
        buf.put_u32(self.now);
        buf.to_vec()
    }

    /// Decode a wire datagram
    ///
    /// # Errors
    ///
    /// Returns [`RtpDecodeError`] on a short datagram or a payload type
    /// other than 0x54.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }

        let pt = payload_type_of(buf[1]);
        if pt != payload_type::SYNC {
            return Err(RtpDecodeError::UnexpectedPayloadType {
                expected: payload_type::SYNC,
                actual: pt,
            });
        }

        Ok(Self {
            first: is_first(buf[0]),
            now_minus_latency: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            time_last_sync: NtpTime::decode(&buf[8..16]),
            now: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }
}
