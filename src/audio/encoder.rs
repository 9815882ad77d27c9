//! ALAC and raw-L16 packet encoding

use alac_encoder::{AlacEncoder, FormatDescription};

use crate::protocol::rtp::constants::{CHANNELS, FRAMES_PER_PACKET, PACKET_PCM_BYTES, SAMPLE_RATE};

/// Encodes fixed 352-frame PCM packets to ALAC.
///
/// The codec itself comes from the `alac-encoder` crate; this wrapper
/// fixes the AirTunes format (44.1 kHz, 16-bit, stereo) and owns the
/// scratch output buffer.
pub struct AlacPacketEncoder {
    encoder: AlacEncoder,
    input_format: FormatDescription,
    output: Vec<u8>,
}

impl AlacPacketEncoder {
    /// Create an encoder for the fixed AirTunes format
    #[must_use]
    pub fn new() -> Self {
        let alac_format =
            FormatDescription::alac(f64::from(SAMPLE_RATE), FRAMES_PER_PACKET, CHANNELS);
        let input_format = FormatDescription::pcm::<i16>(f64::from(SAMPLE_RATE), CHANNELS);

        Self {
            encoder: AlacEncoder::new(&alac_format),
            input_format,
            // ALAC worst case is slightly larger than the raw input
            output: vec![0u8; PACKET_PCM_BYTES + 256],
        }
    }

    /// Encode one packet of interleaved 16-bit LE PCM.
    ///
    /// `pcm` must be exactly [`PACKET_PCM_BYTES`] long; the pipeline
    /// zero-pads the stream tail to guarantee that.
    #[must_use]
    pub fn encode_packet(&mut self, pcm: &[u8]) -> Vec<u8> {
        debug_assert_eq!(pcm.len(), PACKET_PCM_BYTES);
        let written = self.encoder.encode(&self.input_format, pcm, &mut self.output);
        self.output[..written].to_vec()
    }
}

impl Default for AlacPacketEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte-swap little-endian PCM to the big-endian L16 wire order
#[must_use]
pub fn byteswap_l16(pcm: &[u8]) -> Vec<u8> {
    let mut out = pcm.to_vec();
    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}
