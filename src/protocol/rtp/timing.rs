//! Timing packets: receivers probe our clock over the timing channel

use bytes::{BufMut, BytesMut};

use super::packet::{payload_type_of, RtpDecodeError};
use super::payload_type;
use crate::clock::NtpTime;

/// Timing packets carry the literal sequence value 7, like sync packets.
const TIMING_SEQ: u16 = 0x0007;

/// Direction of a timing packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingKind {
    /// Payload type 0x52, receiver asking for our clock
    Request,
    /// Payload type 0x53, our answer
    Response,
}

impl TimingKind {
    fn payload_type(self) -> u8 {
        match self {
            Self::Request => payload_type::TIMING_REQUEST,
            Self::Response => payload_type::TIMING_RESPONSE,
        }
    }

    fn from_payload_type(pt: u8) -> Option<Self> {
        match pt {
            payload_type::TIMING_REQUEST => Some(Self::Request),
            payload_type::TIMING_RESPONSE => Some(Self::Response),
            _ => None,
        }
    }
}

/// A 32-byte timing request or response.
///
/// The gap between `received_time` and `send_time` in a response is our
/// processing delay; the receiver folds it out of its offset estimate,
/// so the two must come from separate clock reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingPacket {
    /// Request or response
    pub kind: TimingKind,
    /// Echo of the request's `send_time` (zero in requests)
    pub reference_time: NtpTime,
    /// When the request hit our socket (zero in requests)
    pub received_time: NtpTime,
    /// When this packet was sent
    pub send_time: NtpTime,
}

impl TimingPacket {
    /// Wire size in bytes
    pub const SIZE: usize = 32;

    /// Build the response to a request.
    ///
    /// `received_time` is captured as close to the socket read as
    /// possible; `send_time` immediately before the socket write.
    #[must_use]
    pub fn response_to(request: &TimingPacket, received_time: NtpTime, send_time: NtpTime) -> Self {
        Self {
            kind: TimingKind::Response,
            reference_time: request.send_time,
            received_time,
            send_time,
        }
    }

    /// Encode into a wire datagram
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(0x80);
        buf.put_u8(0x80 | self.kind.payload_type());
        buf.put_u16(TIMING_SEQ);
        buf.put_u32(0); // zero padding
        buf.put_slice(&self.reference_time.encode());
        buf.put_slice(&self.received_time.encode());
        buf.put_slice(&self.send_time.encode());
        buf.to_vec()
    }

    /// Decode either direction of timing packet
    ///
    /// # Errors
    ///
    /// Returns [`RtpDecodeError`] on a short datagram or a payload type
    /// that is neither 0x52 nor 0x53.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }

        let pt = payload_type_of(buf[1]);
        let kind = TimingKind::from_payload_type(pt).ok_or(
            RtpDecodeError::UnexpectedPayloadType {
                expected: payload_type::TIMING_REQUEST,
                actual: pt,
            },
        )?;

        Ok(Self {
            kind,
            reference_time: NtpTime::decode(&buf[8..16]),
            received_time: NtpTime::decode(&buf[16..24]),
            send_time: NtpTime::decode(&buf[24..32]),
        })
    }

    /// Decode, additionally insisting on a request (payload type 0x52)
    ///
    /// # Errors
    ///
    /// Returns [`RtpDecodeError::UnexpectedPayloadType`] for anything
    /// else, including well-formed responses.
    pub fn decode_request(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        let packet = Self::decode(buf)?;
        if packet.kind != TimingKind::Request {
            return Err(RtpDecodeError::UnexpectedPayloadType {
                expected: payload_type::TIMING_REQUEST,
                actual: payload_type::TIMING_RESPONSE,
            });
        }
        Ok(packet)
    }
}
