//! Configuration and receiver descriptions

mod config;
mod device;

pub use config::{AirTunesConfig, AirTunesConfigBuilder, StreamCodec};
pub use device::{parse_service_name, RaopDevice, TxtRecord};
