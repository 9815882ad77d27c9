//! Resend requests received on the control channel

use bytes::{BufMut, BytesMut};

use super::packet::{payload_type_of, RtpDecodeError};
use super::payload_type;

/// A receiver asking for `count` packets starting at `missed_seq`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequest {
    /// First missing sequence number
    pub missed_seq: u16,
    /// How many consecutive packets are missing
    pub count: u16,
}

impl ResendRequest {
    /// Wire size in bytes
    pub const SIZE: usize = 8;

    /// Encode into a wire datagram (receivers send these; we encode them
    /// for tests and loopback probes)
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(0x80);
        buf.put_u8(0x80 | payload_type::RESEND_REQUEST);
        buf.put_u16(0x0001);
        buf.put_u16(self.missed_seq);
        buf.put_u16(self.count);
        buf.to_vec()
    }

    /// Decode a wire datagram
    ///
    /// # Errors
    ///
    /// Returns [`RtpDecodeError`] on a short datagram or a payload type
    /// other than 0x55.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }

        let pt = payload_type_of(buf[1]);
        if pt != payload_type::RESEND_REQUEST {
            return Err(RtpDecodeError::UnexpectedPayloadType {
                expected: payload_type::RESEND_REQUEST,
                actual: pt,
            });
        }

        Ok(Self {
            missed_seq: u16::from_be_bytes([buf[4], buf[5]]),
            count: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    /// The requested sequence numbers, in order, wrapping mod 2^16
    pub fn sequences(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.count).map(move |i| self.missed_seq.wrapping_add(i))
    }
}
