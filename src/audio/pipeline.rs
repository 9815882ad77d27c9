//! PCM → encoded payload pipeline.
//!
//! The pipeline owns the PCM source and yields one encoded payload per
//! 352-frame packet. Sequence numbers, timestamps and per-session
//! encryption belong to the layers above; the pipeline is pure payload
//! production.

use bytes::Bytes;

use super::encoder::{byteswap_l16, AlacPacketEncoder};
use super::source::PcmSource;
use crate::protocol::rtp::constants::{FRAMES_PER_PACKET, FRAME_BYTES, PACKET_PCM_BYTES};
use crate::protocol::rtp::payload_type;
use crate::types::StreamCodec;

/// One packet's worth of encoded audio
#[derive(Debug, Clone)]
pub struct PipelinePacket {
    /// Encoded, unencrypted payload bytes
    pub payload: Bytes,
    /// RTP payload type matching the codec
    pub payload_type: u8,
    /// Frames consumed, always [`FRAMES_PER_PACKET`] (the tail packet is
    /// zero-padded up to it)
    pub frames: u32,
}

/// Pulls PCM and produces encoded packet payloads in emission order
pub struct PacketPipeline {
    source: Box<dyn PcmSource>,
    codec: StreamCodec,
    alac: AlacPacketEncoder,
    pcm_buf: Box<[u8; PACKET_PCM_BYTES]>,
    finished: bool,
}

impl PacketPipeline {
    /// Create a pipeline over `source`
    #[must_use]
    pub fn new(source: Box<dyn PcmSource>, codec: StreamCodec) -> Self {
        Self {
            source,
            codec,
            alac: AlacPacketEncoder::new(),
            pcm_buf: Box::new([0u8; PACKET_PCM_BYTES]),
            finished: false,
        }
    }

    /// Whether the source has been exhausted
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Produce the next packet payload, or `None` at end of stream.
    ///
    /// A partial final read is zero-padded to a full 352-frame packet.
    pub fn next_packet(&mut self) -> Option<PipelinePacket> {
        if self.finished {
            return None;
        }

        let frames = self.source.read_frames(&mut self.pcm_buf[..]);
        if frames == 0 {
            self.finished = true;
            return None;
        }

        if frames < FRAMES_PER_PACKET as usize {
            self.pcm_buf[frames * FRAME_BYTES..].fill(0);
            self.finished = true;
        }

        let (payload, payload_type) = match self.codec {
            StreamCodec::Alac => (
                self.alac.encode_packet(&self.pcm_buf[..]),
                payload_type::AUDIO,
            ),
            StreamCodec::RawL16 => (byteswap_l16(&self.pcm_buf[..]), payload_type::AUDIO_RAW),
        };

        Some(PipelinePacket {
            payload: Bytes::from(payload),
            payload_type,
            frames: FRAMES_PER_PACKET,
        })
    }
}
