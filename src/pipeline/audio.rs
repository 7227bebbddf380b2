//! Audio frame assembly: leading-edge trim, lock-step ring buffering and
//! fixed-frame encoding.

use log::warn;

use crate::encoder::{AudioStream, Packet};
use crate::media::AudioBlockRef;
use crate::time::TimeBase;

use super::align;
use super::ring::ExcessBuffer;

/// The audio half of one output: admits host blocks, buffers the excess
/// and drains exactly one encoder frame at a time.
///
/// Only the audio delivery callback touches a lane, under the output's
/// audio lock; packets leave through the caller-supplied writer.
pub(crate) struct AudioLane {
    stream: AudioStream,
    sample_rate: u32,
    /// Bytes one sample frame occupies in each plane.
    unit_bytes: usize,
    frame_samples: usize,
    /// `frame_samples * unit_bytes`, the drain threshold.
    frame_bytes: usize,
    rings: Vec<ExcessBuffer>,
    /// Codec-native staging buffers, one per plane, reused every frame.
    samples: Vec<Vec<u8>>,
    /// Running sample counter; the sole source of audio presentation
    /// timestamps.
    total_samples: i64,
    sample_time_base: TimeBase,
}

impl AudioLane {
    pub fn new(stream: AudioStream, sample_rate: u32, channels: u16) -> Self {
        let format = stream.encoder.sample_format();
        let plane_count = format.plane_count(channels);
        let unit_bytes = format.frame_unit_bytes(channels);
        let frame_samples = stream.encoder.frame_samples();
        let frame_bytes = frame_samples * unit_bytes;

        Self {
            sample_rate,
            unit_bytes,
            frame_samples,
            frame_bytes,
            rings: (0..plane_count).map(|_| ExcessBuffer::new()).collect(),
            samples: (0..plane_count).map(|_| vec![0u8; frame_bytes]).collect(),
            total_samples: 0,
            sample_time_base: TimeBase::new(1, sample_rate as i32),
            stream,
        }
    }

    pub fn codec_time_base(&self) -> TimeBase {
        self.stream.encoder.time_base()
    }

    pub fn stream_time_base(&self) -> TimeBase {
        self.stream.stream_time_base
    }

    #[cfg(test)]
    pub fn total_samples(&self) -> i64 {
        self.total_samples
    }

    #[cfg(test)]
    pub fn buffered_bytes(&self) -> Vec<usize> {
        self.rings.iter().map(|ring| ring.len()).collect()
    }

    /// Admit one host block and drain every full encoder frame it
    /// completes, handing packets to `write`.
    ///
    /// All planes are validated before any byte is pushed so the rings can
    /// never go out of lock-step, and they are pushed and popped with
    /// identical byte counts in the same call sequence.
    pub fn process_block(
        &mut self,
        block: &AudioBlockRef<'_>,
        start_ts: u64,
        write: &mut dyn FnMut(Packet),
    ) {
        let Some((cutoff, admitted)) =
            align::clip_to_start(block.timestamp, block.frames, self.sample_rate, start_ts)
        else {
            return;
        };
        if admitted == 0 {
            return;
        }

        let skip = cutoff as usize * self.unit_bytes;
        let take = admitted as usize * self.unit_bytes;

        if block.planes.len() < self.rings.len() {
            warn!(
                "audio block carries {} planes, expected {}; dropped",
                block.planes.len(),
                self.rings.len()
            );
            return;
        }
        for plane in &block.planes[..self.rings.len()] {
            if plane.len() < skip + take {
                warn!(
                    "audio plane holds {} bytes, expected {}; block dropped",
                    plane.len(),
                    skip + take
                );
                return;
            }
        }

        for (ring, plane) in self.rings.iter_mut().zip(block.planes) {
            ring.push(&plane[skip..skip + take]);
        }

        while self.rings[0].len() >= self.frame_bytes {
            for (ring, buf) in self.rings.iter_mut().zip(self.samples.iter_mut()) {
                ring.pop(&mut buf[..]);
            }

            let pts = self
                .sample_time_base
                .rescale(self.total_samples, self.stream.encoder.time_base());
            self.total_samples += self.frame_samples as i64;

            let planes: Vec<&[u8]> = self.samples.iter().map(|buf| buf.as_slice()).collect();
            match self.stream.encoder.encode(&planes, pts) {
                Ok(Some(packet)) => write(packet),
                Ok(None) => {}
                Err(e) => warn!("audio encode failed, frame dropped: {e:#}"),
            }
        }
    }
}
