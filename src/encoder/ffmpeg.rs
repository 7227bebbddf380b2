//! `ac-ffmpeg` implementation of the encode/mux toolkit seam.
//!
//! Resolves an H.264 video encoder and an AAC audio encoder, opens the
//! container guessed from the destination path and writes interleaved
//! packets through the FFmpeg muxer. Requires the FFmpeg system libraries
//! at build time (`ffmpeg` cargo feature).

use std::fs::File;

use ac_ffmpeg::codec::audio::frame::get_sample_format;
use ac_ffmpeg::codec::audio::{AudioEncoder, AudioFrameMut};
use ac_ffmpeg::codec::video::frame::get_pixel_format;
use ac_ffmpeg::codec::video::{VideoEncoder, VideoFrameMut};
use ac_ffmpeg::codec::Encoder;
use ac_ffmpeg::format::io::IO;
use ac_ffmpeg::format::muxer::{Muxer, OutputFormat};
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase as AcTimeBase, Timestamp as AcTimestamp};
use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use log::info;

use crate::config::OutputConfig;
use crate::media::{AudioSourceInfo, PixelFormat, SampleFormat, VideoSourceInfo};
use crate::pipeline::conform::PictureBuf;
use crate::time::TimeBase;

use super::{
    AudioEncode, AudioStream, Backend, ContainerSink, OpenOutput, Packet, PictureLayout,
    StreamKind, VideoEncode, VideoStream,
};

/// Intermediate and encoder pixel format; keeping both on planar 4:2:0
/// makes the conform stage a plain plane copy.
const VIDEO_PIXEL_FORMAT: PixelFormat = PixelFormat::Yuv420p;
/// Sample format the AAC encoder consumes.
const AUDIO_SAMPLE_FORMAT: SampleFormat = SampleFormat::F32p;
/// Fallback when the codec does not advertise a fixed frame size.
const DEFAULT_FRAME_SAMPLES: usize = 1024;

/// FFmpeg-backed toolkit.
pub struct FfmpegBackend {
    video_codec: String,
    audio_codec: String,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }

    pub fn with_codecs(video_codec: impl Into<String>, audio_codec: impl Into<String>) -> Self {
        Self {
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
        }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for FfmpegBackend {
    fn open(
        &self,
        config: &OutputConfig,
        video: &VideoSourceInfo,
        audio: &AudioSourceInfo,
    ) -> Result<OpenOutput> {
        let output_format = OutputFormat::guess_from_file_name(&config.destination)
            .ok_or_else(|| anyhow!("no container format for '{}'", config.destination))?;

        // One codec tick per frame, like the muxer expects from a CFR input.
        let video_time_base = AcTimeBase::new(video.fps_den as i32, video.fps_num as i32);
        let width = video.width as usize;
        let height = video.height as usize;
        let pixel_format = get_pixel_format(VIDEO_PIXEL_FORMAT.name());

        let video_encoder = VideoEncoder::builder(&self.video_codec)
            .with_context(|| format!("video encoder '{}' unavailable", self.video_codec))?
            .pixel_format(pixel_format)
            .width(width)
            .height(height)
            .time_base(video_time_base)
            .set_option("preset", "veryfast")
            .set_option("b", &config.video_bitrate.to_string())
            .set_option("g", &config.gop_size.to_string())
            .build()
            .with_context(|| format!("failed to open video encoder '{}'", self.video_codec))?;

        let channel_layout =
            ac_ffmpeg::codec::audio::ChannelLayout::from_channels(audio.channels as u32)
                .ok_or_else(|| anyhow!("unsupported channel count {}", audio.channels))?;

        let audio_encoder = AudioEncoder::builder(&self.audio_codec)
            .with_context(|| format!("audio encoder '{}' unavailable", self.audio_codec))?
            .sample_rate(audio.sample_rate)
            .channel_layout(channel_layout)
            .sample_format(get_sample_format(AUDIO_SAMPLE_FORMAT.name()))
            .set_option("b", &config.audio_bitrate.to_string())
            .build()
            .with_context(|| format!("failed to open audio encoder '{}'", self.audio_codec))?;

        let file = File::create(&config.destination)
            .with_context(|| format!("failed to create '{}'", config.destination))?;
        let io = IO::from_seekable_write_stream(file);

        let mut builder = Muxer::builder();
        builder.add_stream(&video_encoder.codec_parameters().into())?;
        builder.add_stream(&audio_encoder.codec_parameters().into())?;
        // Writes the container header.
        let muxer = builder
            .build(io, output_format)
            .with_context(|| format!("failed to open container '{}'", config.destination))?;

        info!(
            "opened '{}' ({}x{} {} + {} Hz {})",
            config.destination, width, height, self.video_codec, audio.sample_rate,
            self.audio_codec,
        );

        // The staging layout mirrors the frames the encoder allocates, so
        // probe one frame for the real per-plane strides.
        let probe = VideoFrameMut::black(pixel_format, width, height);
        let strides = probe
            .planes()
            .iter()
            .enumerate()
            .map(|(plane, data)| {
                let rows = VIDEO_PIXEL_FORMAT.plane_rows(plane, height);
                data.data().len() / rows.max(1)
            })
            .collect();

        let frame_samples = audio_encoder
            .samples_per_frame()
            .unwrap_or(DEFAULT_FRAME_SAMPLES);
        let audio_time_base = TimeBase::new(1, audio.sample_rate as i32);

        let video_stream = VideoStream {
            encoder: Box::new(FfmpegVideo {
                encoder: video_encoder,
                layout: PictureLayout {
                    format: VIDEO_PIXEL_FORMAT,
                    width,
                    height,
                    strides,
                },
                time_base: TimeBase::new(video.fps_den as i32, video.fps_num as i32),
                ac_time_base: video_time_base,
                pixel_format,
            }),
            // The muxer rescales from each packet's own time base into the
            // stream internally, so packets stay in codec ticks here.
            stream_time_base: TimeBase::new(video.fps_den as i32, video.fps_num as i32),
            convert: None,
            passthrough: false,
        };

        let audio_stream = AudioStream {
            encoder: Box::new(FfmpegAudio {
                encoder: audio_encoder,
                frame_samples,
                time_base: audio_time_base,
                ac_time_base: AcTimeBase::new(1, audio.sample_rate as i32),
            }),
            stream_time_base: audio_time_base,
        };

        Ok(OpenOutput {
            video: Some(video_stream),
            audio: Some(audio_stream),
            sink: Box::new(FfmpegSink {
                muxer,
                video_time_base,
                audio_time_base: AcTimeBase::new(1, audio.sample_rate as i32),
            }),
        })
    }
}

struct FfmpegVideo {
    encoder: VideoEncoder,
    layout: PictureLayout,
    time_base: TimeBase,
    ac_time_base: AcTimeBase,
    pixel_format: ac_ffmpeg::codec::video::frame::PixelFormat,
}

impl VideoEncode for FfmpegVideo {
    fn layout(&self) -> &PictureLayout {
        &self.layout
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn encode(&mut self, picture: &PictureBuf, pts: i64) -> Result<Option<Packet>> {
        let mut frame =
            VideoFrameMut::black(self.pixel_format, self.layout.width, self.layout.height)
                .with_time_base(self.ac_time_base)
                .with_pts(AcTimestamp::new(pts, self.ac_time_base));

        for plane in 0..picture.plane_count() {
            let mut planes = frame.planes_mut();
            let src = picture.plane(plane);
            let dst = planes[plane].data_mut();
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }

        self.encoder.push(frame.freeze())?;

        match self.encoder.take()? {
            Some(packet) => Ok(Some(Packet {
                data: Bytes::copy_from_slice(packet.data()),
                pts: packet.pts().timestamp(),
                dts: packet.dts().timestamp(),
                duration: 1,
                keyframe: packet.is_key(),
            })),
            None => Ok(None),
        }
    }
}

struct FfmpegAudio {
    encoder: AudioEncoder,
    frame_samples: usize,
    time_base: TimeBase,
    ac_time_base: AcTimeBase,
}

impl AudioEncode for FfmpegAudio {
    fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    fn sample_format(&self) -> SampleFormat {
        AUDIO_SAMPLE_FORMAT
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn encode(&mut self, planes: &[&[u8]], pts: i64) -> Result<Option<Packet>> {
        let params = self.encoder.codec_parameters();
        let mut frame = AudioFrameMut::silence(
            params.channel_layout(),
            params.sample_format(),
            params.sample_rate(),
            self.frame_samples,
        )
        .with_time_base(self.ac_time_base)
        .with_pts(AcTimestamp::new(pts, self.ac_time_base));

        for (plane, src) in planes.iter().enumerate() {
            let mut frame_planes = frame.planes_mut();
            let Some(slot) = frame_planes.get_mut(plane) else {
                break;
            };
            let dst = slot.data_mut();
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }

        self.encoder.push(frame.freeze())?;

        match self.encoder.take()? {
            Some(packet) => Ok(Some(Packet {
                data: Bytes::copy_from_slice(packet.data()),
                pts: packet.pts().timestamp(),
                dts: packet.dts().timestamp(),
                duration: self.frame_samples as i64,
                keyframe: false,
            })),
            None => Ok(None),
        }
    }
}

struct FfmpegSink {
    muxer: Muxer<File>,
    video_time_base: AcTimeBase,
    audio_time_base: AcTimeBase,
}

impl ContainerSink for FfmpegSink {
    fn write(&mut self, stream: StreamKind, packet: &Packet) -> Result<()> {
        let (index, time_base) = match stream {
            StreamKind::Video => (0, self.video_time_base),
            StreamKind::Audio => (1, self.audio_time_base),
        };

        let mut raw = PacketMut::new(packet.data.len());
        raw.data_mut().copy_from_slice(&packet.data);
        let raw = raw
            .freeze()
            .with_stream_index(index)
            .with_pts(AcTimestamp::new(packet.pts, time_base))
            .with_dts(AcTimestamp::new(packet.dts, time_base));

        self.muxer.push(raw)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.muxer.flush()?;
        Ok(())
    }
}
