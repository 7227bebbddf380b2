//! Error taxonomy for the output lifecycle.

use thiserror::Error;

use crate::media::SampleFormat;

/// Failures surfaced by [`FileOutput`](crate::pipeline::FileOutput).
///
/// Only lifecycle operations report typed errors. Runtime encode and write
/// failures after streaming begins are logged and the affected unit is
/// dropped; the pipeline keeps running and keeps reporting itself active
/// until explicitly stopped.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("destination path is empty")]
    EmptyDestination,

    #[error("no active video source")]
    NoVideoSource,

    #[error("no active audio source")]
    NoAudioSource,

    #[error("output is already active")]
    AlreadyActive,

    #[error("output format requires no streams")]
    NoStreams,

    #[error("host delivers {granted} audio but the encoder requires {requested}")]
    SampleFormatMismatch {
        requested: SampleFormat,
        granted: SampleFormat,
    },

    #[error("failed to open output")]
    Init(#[source] anyhow::Error),

    #[error("failed to finalize output")]
    Finalize(#[source] anyhow::Error),
}
