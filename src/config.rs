//! Output configuration supplied by the host.
//!
//! Settings parsing and persistence stay on the host side; this is just the
//! handful of parameters the pipeline forwards to the encode/mux toolkit.

/// Parameters for one file output.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Destination container path. The container format is inferred from it
    /// by the toolkit (typically from the extension).
    pub destination: String,
    /// Target video bit rate in bits per second.
    pub video_bitrate: u64,
    /// Target audio bit rate in bits per second.
    pub audio_bitrate: u64,
    /// Keyframe interval in frames.
    pub gop_size: u32,
}

impl OutputConfig {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            video_bitrate: 6_000_000,
            audio_bitrate: 128_000,
            gop_size: 12,
        }
    }
}
