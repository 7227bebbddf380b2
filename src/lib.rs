//! Audio/video synchronization and file muxing pipeline.
//!
//! Host applications push independently clocked raw video frames and audio
//! sample blocks into a [`pipeline::FileOutput`]. The pipeline aligns both
//! streams to the timestamp of the first video frame, reformats them into
//! the layouts the encoders expect, and writes the resulting packets
//! interleaved into a container file through a single serialized write
//! point.
//!
//! The crate is purely reactive: it spawns no threads and never suspends;
//! every call is synchronous and bounded. Capture, scheduling and settings
//! parsing belong to the host behind the [`host`] traits; codec bit-stream
//! encoding and container muxing belong to the external toolkit behind the
//! [`encoder`] traits (enable the `ffmpeg` feature for the bundled
//! `ac-ffmpeg` backend).

pub mod config;
pub mod encoder;
pub mod error;
pub mod host;
pub mod media;
pub mod pipeline;
pub mod time;

pub use config::OutputConfig;
pub use error::OutputError;
pub use pipeline::{FileOutput, OutputState};
