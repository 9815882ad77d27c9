//! Monotonic NTP/RTP clock.
//!
//! All wire timestamps are derived from a single `(SystemTime, Instant)`
//! pair captured when the clock is first touched, so wall-clock jumps
//! after process start cannot corrupt sync.

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Seconds between 1900-01-01 (NTP epoch) and 1970-01-01 (Unix epoch)
pub const NTP_UNIX_OFFSET: u64 = 0x83AA_7E80;

/// RTP timestamp ticks per second (one tick per frame at 44.1 kHz)
pub const TIMESTAMPS_PER_SECOND: u32 = 44_100;

static CLOCK_EPOCH: OnceLock<(Duration, Instant)> = OnceLock::new();

fn epoch() -> (Duration, Instant) {
    *CLOCK_EPOCH.get_or_init(|| {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (wall, Instant::now())
    })
}

/// 64-bit NTP timestamp: seconds since 1900 plus a 2^-32 s fraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NtpTime {
    /// Seconds since the NTP epoch
    pub seconds: u32,
    /// Fractional second, `[0, 1)` mapped onto `[0, 2^32)`
    pub fraction: u32,
}

impl NtpTime {
    /// Current time from the monotonic-backed process clock
    #[must_use]
    pub fn now() -> Self {
        let (wall, instant) = epoch();
        Self::from_unix(wall + instant.elapsed())
    }

    /// Convert a duration since the Unix epoch to NTP time
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_unix(since_unix: Duration) -> Self {
        let seconds = (since_unix.as_secs() + NTP_UNIX_OFFSET) as u32;
        let fraction = ((u64::from(since_unix.subsec_nanos()) << 32) / 1_000_000_000) as u32;
        Self { seconds, fraction }
    }

    /// Encode to 8 big-endian bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
        buf
    }

    /// Decode from 8 big-endian bytes
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than 8 bytes; callers validate length.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            seconds: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// The whole 64-bit value, seconds in the high word
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        (u64::from(self.seconds) << 32) | u64::from(self.fraction)
    }

    /// Split a 64-bit value back into an `NtpTime`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_u64(value: u64) -> Self {
        Self {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    /// Microseconds since the NTP epoch
    #[must_use]
    pub fn to_micros(&self) -> u64 {
        u64::from(self.seconds) * 1_000_000 + ((u64::from(self.fraction) * 1_000_000) >> 32)
    }
}

/// Current NTP time; shorthand for [`NtpTime::now`]
#[must_use]
pub fn now_ntp() -> NtpTime {
    NtpTime::now()
}

/// Extrapolate the RTP timestamp from a stream origin.
///
/// `start_ts` is the timestamp of the packet emitted at `start_instant`;
/// the result advances at [`TIMESTAMPS_PER_SECOND`] and wraps mod 2^32.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_rtp(start_ts: u32, start_instant: Instant) -> u32 {
    let elapsed = start_instant.elapsed();
    let ticks = elapsed.as_nanos() * u128::from(TIMESTAMPS_PER_SECOND) / 1_000_000_000;
    start_ts.wrapping_add(ticks as u32)
}
