//! Wire formats and crypto: everything that produces or parses bytes

pub mod crypto;
pub mod daap;
pub mod rtp;
pub mod rtsp;
pub mod sdp;
