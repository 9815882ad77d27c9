use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{AirTunesError, Result};

/// An AirTunes receiver to stream to.
///
/// Discovery itself (mDNS browsing) is outside this crate; callers hand
/// in the resolved address and, when available, the service TXT record.
#[derive(Debug, Clone)]
pub struct RaopDevice {
    /// Human-readable name, usually the part after `@` in the service name
    pub name: String,
    /// RTSP endpoint (receivers conventionally listen on TCP 5000)
    pub addr: SocketAddr,
    /// Password, for receivers that advertise `pw=true`
    pub password: Option<String>,
    /// Parsed `_raop._tcp` TXT record, if discovery provided one
    pub txt: Option<TxtRecord>,
}

impl RaopDevice {
    /// Describe a receiver by name and RTSP address
    #[must_use]
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
            password: None,
            txt: None,
        }
    }

    /// Attach a password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Attach a parsed TXT record
    #[must_use]
    pub fn with_txt(mut self, txt: TxtRecord) -> Self {
        self.txt = Some(txt);
        self
    }

    /// Whether the advertisement demands a password
    #[must_use]
    pub fn password_required(&self) -> bool {
        self.txt.as_ref().is_some_and(|t| t.password_required)
    }
}

/// The `_raop._tcp` TXT fields the engine consumes
#[derive(Debug, Clone, Default)]
pub struct TxtRecord {
    /// `pw`: receiver requires a password
    pub password_required: bool,
    /// `sr`: sample rate
    pub sample_rate: Option<u32>,
    /// `ss`: sample size in bits
    pub sample_size: Option<u8>,
    /// `ch`: channel count
    pub channels: Option<u8>,
    /// `tp`: transports, e.g. `UDP` or `TCP,UDP`
    pub transports: Option<String>,
    /// `raAudioFormats`: Rogue-Amoeba advertised formats
    pub audio_formats: Option<String>,
    /// `rast`: Rogue-Amoeba source type
    pub source_type: Option<String>,
    /// `ramach`: Rogue-Amoeba machine name; its presence selects the
    /// PList album-art path
    pub machine: Option<String>,
    /// `raver`: Rogue-Amoeba version
    pub version: Option<String>,
}

impl TxtRecord {
    /// Parse the key/value map of a `_raop._tcp` TXT record.
    ///
    /// # Errors
    ///
    /// Returns [`AirTunesError::CapabilityMismatch`] when `txtvers` is
    /// present with a value other than `1`.
    pub fn parse(map: &HashMap<String, String>) -> Result<Self> {
        if let Some(vers) = map.get("txtvers") {
            if vers.trim() != "1" {
                return Err(AirTunesError::CapabilityMismatch(format!(
                    "unsupported txtvers {vers}"
                )));
            }
        }

        Ok(Self {
            password_required: map
                .get("pw")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            sample_rate: map.get("sr").and_then(|v| v.parse().ok()),
            sample_size: map.get("ss").and_then(|v| v.parse().ok()),
            channels: map.get("ch").and_then(|v| v.parse().ok()),
            transports: map.get("tp").cloned(),
            audio_formats: map.get("raAudioFormats").cloned(),
            source_type: map.get("rast").cloned(),
            machine: map.get("ramach").cloned(),
            version: map.get("raver").cloned(),
        })
    }

    /// Whether UDP transport is available (AirTunes v2 requires it)
    #[must_use]
    pub fn supports_udp(&self) -> bool {
        match &self.transports {
            Some(tp) => tp.split(',').any(|t| t.trim().eq_ignore_ascii_case("UDP")),
            None => true,
        }
    }
}

/// Split a `_raop._tcp` instance name of the form `{MAC}@{Name}`.
///
/// Returns `(mac, name)` when the prefix is 12 hex digits.
#[must_use]
pub fn parse_service_name(instance: &str) -> Option<(String, String)> {
    let (mac, name) = instance.split_once('@')?;
    let mac = mac.to_uppercase();
    if mac.len() == 12 && mac.chars().all(|c| c.is_ascii_hexdigit()) {
        Some((mac, name.to_string()))
    } else {
        None
    }
}
