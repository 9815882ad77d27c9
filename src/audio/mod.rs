//! PCM sources and the PCM → RTP payload pipeline

mod encoder;
mod pipeline;
mod source;


pub use encoder::AlacPacketEncoder;
pub use pipeline::{PacketPipeline, PipelinePacket};
pub use source::{PcmSource, SilenceSource, VecSource};
