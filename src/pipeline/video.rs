//! Video lane: conform, encode or raw passthrough.

use bytes::Bytes;
use log::warn;

use crate::encoder::{Packet, VideoStream};
use crate::media::VideoFrameRef;
use crate::time::TimeBase;

use super::conform::{self, PictureBuf};

/// The video half of one output.
///
/// Only the video delivery callback touches a lane, under the output's
/// video lock. The staging picture is allocated once from the encoder's
/// layout and overwritten per frame.
pub(crate) struct VideoLane {
    stream: VideoStream,
    picture: PictureBuf,
    /// Running frame counter; the sole source of video presentation
    /// timestamps.
    total_frames: i64,
}

impl VideoLane {
    pub fn new(stream: VideoStream) -> Self {
        let picture = PictureBuf::new(stream.encoder.layout().clone());
        Self {
            stream,
            picture,
            total_frames: 0,
        }
    }

    pub fn codec_time_base(&self) -> TimeBase {
        self.stream.encoder.time_base()
    }

    pub fn stream_time_base(&self) -> TimeBase {
        self.stream.stream_time_base
    }

    #[cfg(test)]
    pub fn total_frames(&self) -> i64 {
        self.total_frames
    }

    /// Conform one host frame and encode it (or write it raw), handing the
    /// packet to `write`. The frame counter advances for every delivered
    /// frame, failed or not, so the timeline never compresses.
    pub fn process_frame(&mut self, frame: &VideoFrameRef<'_>, write: &mut dyn FnMut(Packet)) {
        let conformed = match self.stream.convert.as_mut() {
            Some(convert) => match convert.convert(frame, &mut self.picture) {
                Ok(()) => true,
                Err(e) => {
                    warn!("pixel conversion failed, frame dropped: {e:#}");
                    false
                }
            },
            None => {
                conform::copy_frame(frame, &mut self.picture);
                true
            }
        };

        if conformed {
            if self.stream.passthrough {
                // Uncompressed container: the picture itself is the packet,
                // and every picture is a sync point.
                let pts = self.total_frames;
                write(Packet {
                    data: Bytes::from(self.picture.flattened()),
                    pts,
                    dts: pts,
                    duration: 1,
                    keyframe: true,
                });
            } else {
                match self.stream.encoder.encode(&self.picture, self.total_frames) {
                    Ok(Some(packet)) => write(packet),
                    Ok(None) => {}
                    Err(e) => warn!("video encode failed, frame dropped: {e:#}"),
                }
            }
        }

        self.total_frames += 1;
    }
}
