//! External encode/mux toolkit seam.
//!
//! Everything behind these traits is owned by the multimedia toolkit; the
//! pipeline drives it through an open/encode/write/close contract and never
//! inspects packet contents. Errors crossing this seam are opaque
//! [`anyhow::Error`] values.

use anyhow::Result;
use bytes::Bytes;

use crate::config::OutputConfig;
use crate::media::{AudioSourceInfo, PixelFormat, SampleFormat, VideoFrameRef, VideoSourceInfo};
use crate::pipeline::conform::PictureBuf;
use crate::time::TimeBase;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

/// Which container stream a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// One compressed packet. Timestamps are in codec time-base ticks when the
/// encoder produces it; the write point rescales them into stream ticks.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub keyframe: bool,
}

/// Geometry of the staging picture a video encoder consumes.
#[derive(Debug, Clone)]
pub struct PictureLayout {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    /// Row size in bytes of each plane, including padding.
    pub strides: Vec<usize>,
}

/// A video encoder opened for one stream.
pub trait VideoEncode: Send {
    /// Layout of the picture buffer [`encode`](Self::encode) expects.
    fn layout(&self) -> &PictureLayout;

    fn time_base(&self) -> TimeBase;

    /// Encode one conformed picture. `Ok(None)` means the encoder buffered
    /// the frame and produced no packet this call (frame-reordering
    /// encoders); it is not an error.
    fn encode(&mut self, picture: &PictureBuf, pts: i64) -> Result<Option<Packet>>;
}

/// An audio encoder opened for one stream. Consumes fixed-size frames.
pub trait AudioEncode: Send {
    /// Sample frames the codec consumes per `encode` call.
    fn frame_samples(&self) -> usize;

    /// Sample format the encoder requires; the host must deliver exactly
    /// this format.
    fn sample_format(&self) -> SampleFormat;

    fn time_base(&self) -> TimeBase;

    /// Encode one frame of `frame_samples` sample frames, one slice per
    /// plane. `Ok(None)` carries the same meaning as for video.
    fn encode(&mut self, planes: &[&[u8]], pts: i64) -> Result<Option<Packet>>;
}

/// Full-frame pixel conversion, used when the encoder's picture format
/// differs from the host intermediate format.
pub trait PixelConvert: Send {
    fn convert(&mut self, frame: &VideoFrameRef<'_>, picture: &mut PictureBuf) -> Result<()>;
}

/// The opened container. The header is already written when
/// [`Backend::open`] returns; `finalize` writes the trailer and closes the
/// file.
pub trait ContainerSink: Send {
    fn write(&mut self, stream: StreamKind, packet: &Packet) -> Result<()>;

    fn finalize(&mut self) -> Result<()>;
}

/// Video stream descriptor as opened by the backend.
pub struct VideoStream {
    pub encoder: Box<dyn VideoEncode>,
    /// Time base of the container stream packets are rescaled into.
    pub stream_time_base: TimeBase,
    /// Present when the host intermediate format has to be converted into
    /// the encoder's picture format.
    pub convert: Option<Box<dyn PixelConvert>>,
    /// The container wants raw pictures written as keyframe packets instead
    /// of encoded bit-stream.
    pub passthrough: bool,
}

/// Audio stream descriptor as opened by the backend.
pub struct AudioStream {
    pub encoder: Box<dyn AudioEncode>,
    pub stream_time_base: TimeBase,
}

/// Everything one `open` call produced. Dropping it releases every codec,
/// buffer and the container in one motion, which is what open-failure
/// rollback and teardown rely on.
pub struct OpenOutput {
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
    pub sink: Box<dyn ContainerSink>,
}

/// Toolkit entry point: resolve encoders for whatever streams the
/// destination's container format requires, open the container for writing
/// and write its header. Must fail as a unit: a missing encoder or a
/// failed codec/container open returns `Err` with nothing left allocated.
pub trait Backend: Send + Sync {
    fn open(
        &self,
        config: &OutputConfig,
        video: &VideoSourceInfo,
        audio: &AudioSourceInfo,
    ) -> Result<OpenOutput>;
}
