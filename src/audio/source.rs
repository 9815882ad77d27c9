//! Pull-driven PCM sources

use crate::protocol::rtp::constants::FRAME_BYTES;

/// A finite source of interleaved 16-bit little-endian stereo PCM at
/// 44.1 kHz.
///
/// The pipeline pulls one packet's worth of frames at a time; a short
/// read means the stream has reached its end.
pub trait PcmSource: Send {
    /// Fill `buf` (whose length is a multiple of 4) with complete
    /// frames and return how many frames were written.
    ///
    /// Returning fewer frames than fit in `buf` ends the stream; 0 means
    /// the stream was already exhausted.
    fn read_frames(&mut self, buf: &mut [u8]) -> usize;
}

/// A fixed span of silence
pub struct SilenceSource {
    frames_remaining: u64,
}

impl SilenceSource {
    /// A silence source of exactly `frames` frames
    #[must_use]
    pub fn frames(frames: u64) -> Self {
        Self {
            frames_remaining: frames,
        }
    }

    /// A silence source of roughly `seconds` seconds
    #[must_use]
    pub fn seconds(seconds: u64) -> Self {
        Self::frames(seconds * 44_100)
    }
}

impl PcmSource for SilenceSource {
    fn read_frames(&mut self, buf: &mut [u8]) -> usize {
        let want = (buf.len() / FRAME_BYTES) as u64;
        let take = want.min(self.frames_remaining) as usize;
        buf[..take * FRAME_BYTES].fill(0);
        self.frames_remaining -= take as u64;
        take
    }
}

/// PCM held in memory, mostly for tests and short clips
pub struct VecSource {
    data: Vec<u8>,
    pos: usize,
}

impl VecSource {
    /// Wrap raw interleaved LE bytes; a trailing partial frame is dropped
    #[must_use]
    pub fn new(mut data: Vec<u8>) -> Self {
        data.truncate(data.len() - data.len() % FRAME_BYTES);
        Self { data, pos: 0 }
    }

    /// Build from interleaved i16 samples (L, R, L, R, ...)
    #[must_use]
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        Self::new(data)
    }
}

impl PcmSource for VecSource {
    fn read_frames(&mut self, buf: &mut [u8]) -> usize {
        let available = self.data.len() - self.pos;
        let take = buf.len().min(available);
        let take = take - take % FRAME_BYTES;
        buf[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        take / FRAME_BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_counts_down() {
        let mut source = SilenceSource::frames(500);
        let mut buf = [1u8; 352 * FRAME_BYTES];

        assert_eq!(source.read_frames(&mut buf), 352);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(source.read_frames(&mut buf), 148);
        assert_eq!(source.read_frames(&mut buf), 0);
    }

    #[test]
    fn vec_source_yields_its_samples() {
        let mut source = VecSource::from_samples(&[1, -1, 2, -2]);
        let mut buf = [0u8; 16];
        assert_eq!(source.read_frames(&mut buf), 2);
        assert_eq!(&buf[..4], &[1, 0, 0xFF, 0xFF]);
        assert_eq!(source.read_frames(&mut buf), 0);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let source = VecSource::new(vec![0u8; 10]);
        assert_eq!(source.data.len(), 8);
    }
}
