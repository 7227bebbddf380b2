//! Host collaborator seam: source queries, sink registration and push
//! delivery.
//!
//! The pipeline is purely reactive. The host owns capture and threading; it
//! pushes normalized frames into registered sinks from its own threads, in
//! delivery order per stream. Registration requests the exact intermediate
//! formats the pipeline wants to receive.

use std::sync::Arc;

use crate::media::{
    AudioBlockRef, AudioSourceInfo, PixelFormat, SampleFormat, VideoFrameRef, VideoSourceInfo,
};

/// Receives normalized video frames pushed by the host.
pub trait VideoSink: Send + Sync {
    fn receive_video(&self, frame: VideoFrameRef<'_>);
}

/// Receives normalized audio blocks pushed by the host.
pub trait AudioSink: Send + Sync {
    fn receive_audio(&self, block: AudioBlockRef<'_>);
}

/// The host side of the pipeline.
///
/// `video_info`/`audio_info` return `None` when no active source exists.
/// Audio format negotiation happens before sink registration: the host
/// answers with the sample format it will actually deliver, and the
/// pipeline treats any mismatch as an initialization error instead of
/// coercing samples at runtime.
pub trait Host: Send + Sync {
    fn video_info(&self) -> Option<VideoSourceInfo>;

    fn audio_info(&self) -> Option<AudioSourceInfo>;

    fn negotiate_audio_format(&self, requested: SampleFormat) -> SampleFormat;

    fn connect_video(&self, format: PixelFormat, sink: Arc<dyn VideoSink>);

    fn disconnect_video(&self, sink: &Arc<dyn VideoSink>);

    fn connect_audio(&self, format: SampleFormat, sink: Arc<dyn AudioSink>);

    fn disconnect_audio(&self, sink: &Arc<dyn AudioSink>);
}
