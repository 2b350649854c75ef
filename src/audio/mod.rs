pub mod catalog;
pub mod cpal_host;
pub mod error;
pub mod host;
pub mod mixer;
pub mod pcm;
pub mod recorder;
pub mod synthetic;

pub use catalog::DeviceCatalog;
pub use cpal_host::CpalHost;
pub use error::{MixError, RecorderError};
pub use host::{AudioHost, InputDevice, StreamRequest};
pub use mixer::{mixed_path_for, AudioMixer, MixSummary, Track};
pub use recorder::{
    AudioChunk, RecorderState, RecordingSummary, StreamRecorder, DEFAULT_SAMPLE_RATE,
};
pub use synthetic::{SyntheticDevice, SyntheticHost};
