//! Volume mapping between percent and the AirTunes dB scale

/// Volume as a percentage, carried on the wire as attenuation in dB.
///
/// `0` is the mute sentinel `-144.0`; everything else maps linearly
/// into `[-30.0, 0.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(u8);

impl Volume {
    /// Muted
    pub const MUTE: Self = Self(0);
    /// Full volume
    pub const MAX: Self = Self(100);
    /// Half volume, the engine's starting point
    pub const DEFAULT: Self = Self(50);

    /// Clamp a percentage into `[0, 100]`
    #[must_use]
    pub fn from_percent(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// The percentage
    #[must_use]
    pub fn as_percent(&self) -> u8 {
        self.0
    }

    /// The wire value for the `volume:` parameter body
    #[must_use]
    pub fn as_db(&self) -> f32 {
        match self.0 {
            0 => -144.0,
            100 => 0.0,
            v => -30.0 * (100.0 - f32::from(v)) / 100.0,
        }
    }

    /// Whether this is the mute sentinel
    #[must_use]
    pub fn is_mute(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}
