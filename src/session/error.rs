use std::path::PathBuf;
use thiserror::Error;

use crate::audio::{MixError, RecorderError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no recording device selected")]
    NoDeviceSelected,

    #[error("device {name:?} is selected for both slots")]
    DuplicateDevice { name: String },

    #[error("a recording session is already active")]
    AlreadyActive,

    #[error("no recording session is active")]
    NotRecording,

    #[error("cannot create save directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("slot {slot}: {source}")]
    Recorder {
        slot: u8,
        #[source]
        source: RecorderError,
    },

    #[error("mix failed: {0}")]
    Mix(#[from] MixError),
}
