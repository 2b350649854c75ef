use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single stream recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recorder for device {device_index} is already recording")]
    AlreadyRecording { device_index: usize },

    #[error("recorder for device {device_index} is not recording")]
    NotRecording { device_index: usize },

    #[error("input device {device_index} not found")]
    DeviceNotFound { device_index: usize },

    #[error("failed to open input stream on device {device_index}: {reason}")]
    StreamOpen { device_index: usize, reason: String },

    #[error("input stream on device {device_index} failed: {reason}")]
    Stream { device_index: usize, reason: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV error on {path:?}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("recorder thread for device {device_index} panicked")]
    WorkerPanicked { device_index: usize },
}

impl RecorderError {
    /// True for faults raised by the audio hardware rather than the disk or the caller.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. } | Self::StreamOpen { .. } | Self::Stream { .. }
        )
    }
}

/// Failures of the post-recording mix step.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("cannot read {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("sample rates differ ({first} Hz vs {second} Hz); resampling is not supported")]
    SampleRateMismatch { first: u32, second: u32 },

    #[error("cannot overlay {first}-channel and {second}-channel audio")]
    ChannelMismatch { first: u16, second: u16 },

    #[error("cannot create {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("failed writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}
