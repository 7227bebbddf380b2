//! File output lifecycle and the serialized container write point.
//!
//! A [`FileOutput`] is shared as `Arc` and registered with the host as the
//! video and audio sink; the host invokes `receive_video`/`receive_audio`
//! from its own threads, concurrently with each other and with `stop()`.
//! Each lane sits behind its own mutex (uncontended by construction: one
//! delivery callback per lane), while the container sink sits behind the
//! single write lock that serializes every packet write and the final
//! trailer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::config::OutputConfig;
use crate::encoder::{Backend, ContainerSink, Packet, StreamKind};
use crate::error::OutputError;
use crate::host::{AudioSink, Host, VideoSink};
use crate::media::{AudioBlockRef, PixelFormat, VideoFrameRef};
use crate::time::TimeBase;

use super::audio::AudioLane;
use super::state::OutputState;
use super::video::VideoLane;

/// Pixel format requested from the host for delivery; a fixed planar 4:2:0
/// intermediate keeps the conform copy simple.
const INTERMEDIATE_FORMAT: PixelFormat = PixelFormat::Yuv420p;

/// One container file output.
///
/// Created idle; [`start`](Self::start) opens the streams and hooks into
/// host delivery, [`stop`](Self::stop) unhooks and finalizes the file.
/// All methods take `&self` and are safe to call concurrently with
/// in-flight delivery callbacks.
pub struct FileOutput {
    host: Arc<dyn Host>,
    backend: Box<dyn Backend>,
    config: OutputConfig,
    /// Lock-free activity flag; flipped before any teardown work begins so
    /// delivery callbacks observe inactivity promptly.
    active: AtomicBool,
    /// Capture timestamp (ns) of the first video frame; 0 while unset.
    /// Written only by the video callback, read by both lanes.
    start_timestamp: AtomicU64,
    state: Mutex<OutputState>,
    // Lock order: video -> audio -> state -> sink. Callbacks take their own
    // lane then the sink; teardown takes the lanes first so in-flight
    // frames drain before the trailer is written.
    video: Mutex<Option<VideoLane>>,
    audio: Mutex<Option<AudioLane>>,
    sink: Mutex<Option<Box<dyn ContainerSink>>>,
}

impl FileOutput {
    pub fn new(host: Arc<dyn Host>, backend: Box<dyn Backend>, config: OutputConfig) -> Arc<Self> {
        Arc::new(Self {
            host,
            backend,
            config,
            active: AtomicBool::new(false),
            start_timestamp: AtomicU64::new(0),
            state: Mutex::new(OutputState::Idle),
            video: Mutex::new(None),
            audio: Mutex::new(None),
            sink: Mutex::new(None),
        })
    }

    /// Whether the output is currently recording. A pure atomic read,
    /// callable from any thread without locking.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn state(&self) -> OutputState {
        *self.state.lock().unwrap()
    }

    /// Open the streams and container for the configured destination and
    /// hook into host delivery.
    ///
    /// Fails without side effects when preconditions do not hold (already
    /// started, missing host sources, empty destination). A backend open
    /// failure rolls back atomically: dropping the partially opened output
    /// releases every codec, buffer and the container.
    ///
    /// Lifecycle calls come from the host's control context; `start` is not
    /// meant to race itself. A closed output is not restartable; the host
    /// creates a new one per recording.
    pub fn start(self: &Arc<Self>) -> Result<(), OutputError> {
        if !matches!(self.state(), OutputState::Idle) {
            return Err(OutputError::AlreadyActive);
        }

        let video_info = self.host.video_info().ok_or(OutputError::NoVideoSource)?;
        let audio_info = self.host.audio_info().ok_or(OutputError::NoAudioSource)?;

        if self.config.destination.is_empty() {
            return Err(OutputError::EmptyDestination);
        }

        let opened = self
            .backend
            .open(&self.config, &video_info, &audio_info)
            .map_err(OutputError::Init)?;
        if opened.video.is_none() && opened.audio.is_none() {
            return Err(OutputError::NoStreams);
        }

        // Negotiate before registering anything: on a mismatch `opened` is
        // dropped and the container never sees a packet.
        let audio_format = match &opened.audio {
            Some(stream) => {
                let requested = stream.encoder.sample_format();
                let granted = self.host.negotiate_audio_format(requested);
                if granted != requested {
                    return Err(OutputError::SampleFormatMismatch { requested, granted });
                }
                Some(requested)
            }
            None => None,
        };

        info!(
            "starting output '{}' (video: {}, audio: {})",
            self.config.destination,
            opened.video.is_some(),
            opened.audio.is_some()
        );

        let has_video = opened.video.is_some();
        *self.video.lock().unwrap() = opened.video.map(VideoLane::new);
        *self.audio.lock().unwrap() = opened
            .audio
            .map(|stream| AudioLane::new(stream, audio_info.sample_rate, audio_info.channels));
        *self.sink.lock().unwrap() = Some(opened.sink);
        self.start_timestamp.store(0, Ordering::Release);
        self.set_state(OutputState::WaitingForStart);

        // Mark active before hooking in so the first delivered frame is not
        // bounced by the flag.
        self.active.store(true, Ordering::Release);

        if has_video {
            let sink: Arc<dyn VideoSink> = self.clone();
            self.host.connect_video(INTERMEDIATE_FORMAT, sink);
        }
        if let Some(format) = audio_format {
            let sink: Arc<dyn AudioSink> = self.clone();
            self.host.connect_audio(format, sink);
        }

        Ok(())
    }

    /// Unhook from host delivery and finalize the container.
    ///
    /// Idempotent: a second call (or a call before `start`) is a no-op.
    /// Does not interrupt a delivery callback already in flight; it drains
    /// behind the lane locks before the trailer is written. The returned
    /// result is the overall success of finalization.
    pub fn stop(self: &Arc<Self>) -> Result<(), OutputError> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let video_sink: Arc<dyn VideoSink> = self.clone();
        self.host.disconnect_video(&video_sink);
        let audio_sink: Arc<dyn AudioSink> = self.clone();
        self.host.disconnect_audio(&audio_sink);

        // Taking the lane locks waits out any in-flight callback; holding
        // them across finalization keeps a late frame from racing the
        // trailer.
        let mut video = self.video.lock().unwrap();
        let mut audio = self.audio.lock().unwrap();
        let video_lane = video.take();
        let audio_lane = audio.take();
        self.set_state(OutputState::Stopped);

        let mut sink_guard = self.sink.lock().unwrap();
        let result = match sink_guard.take() {
            Some(mut sink) => sink.finalize(),
            None => Ok(()),
        };
        drop(video_lane);
        drop(audio_lane);
        drop(sink_guard);
        drop(audio);
        drop(video);

        self.set_state(OutputState::Closed);
        info!("closed output '{}'", self.config.destination);

        result.map_err(OutputError::Finalize)
    }

    fn set_state(&self, next: OutputState) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(
            state.can_transition_to(&next),
            "invalid output state transition {state} -> {next}"
        );
        *state = next;
    }

    /// Rescale a packet from codec ticks into stream ticks and push it
    /// through the serialized write point. A failed write is logged and the
    /// packet dropped; some containers tolerate isolated losses, and
    /// persistent failure surfaces through `stop()`s finalization result.
    fn write_packet(
        &self,
        stream: StreamKind,
        mut packet: Packet,
        codec_tb: TimeBase,
        stream_tb: TimeBase,
    ) {
        packet.pts = codec_tb.rescale(packet.pts, stream_tb);
        packet.dts = codec_tb.rescale(packet.dts, stream_tb);
        packet.duration = codec_tb.rescale(packet.duration, stream_tb);

        let mut guard = self.sink.lock().unwrap();
        let Some(sink) = guard.as_mut() else {
            return;
        };
        if let Err(e) = sink.write(stream, &packet) {
            warn!("{} packet write failed: {e:#}", match stream {
                StreamKind::Video => "video",
                StreamKind::Audio => "audio",
            });
        }
    }
}

impl VideoSink for FileOutput {
    fn receive_video(&self, frame: VideoFrameRef<'_>) {
        if !self.is_active() {
            return;
        }

        let mut guard = self.video.lock().unwrap();
        let Some(lane) = guard.as_mut() else {
            return;
        };

        if self.start_timestamp.load(Ordering::Acquire) == 0 {
            // The first frame anchors the shared timeline. 0 means "unset",
            // so a host timestamp of exactly 0 is nudged forward by one
            // nanosecond to open the audio gate regardless.
            self.start_timestamp
                .store(frame.timestamp.max(1), Ordering::Release);
            self.set_state(OutputState::Active);
            debug!("recording starts at {} ns", frame.timestamp);
        }

        let codec_tb = lane.codec_time_base();
        let stream_tb = lane.stream_time_base();
        lane.process_frame(&frame, &mut |packet| {
            self.write_packet(StreamKind::Video, packet, codec_tb, stream_tb)
        });
    }
}

impl AudioSink for FileOutput {
    fn receive_audio(&self, block: AudioBlockRef<'_>) {
        if !self.is_active() {
            return;
        }

        // Audio is gated until the first video frame anchors the timeline;
        // blocks arriving earlier are discarded wholesale.
        let start_ts = self.start_timestamp.load(Ordering::Acquire);
        if start_ts == 0 {
            return;
        }

        let mut guard = self.audio.lock().unwrap();
        let Some(lane) = guard.as_mut() else {
            return;
        };

        let codec_tb = lane.codec_time_base();
        let stream_tb = lane.stream_time_base();
        lane.process_block(&block, start_ts, &mut |packet| {
            self.write_packet(StreamKind::Audio, packet, codec_tb, stream_tb)
        });
    }
}
