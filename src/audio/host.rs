//! Host audio layer abstraction.
//!
//! The recorder and the device catalog never talk to cpal directly; they go
//! through [`AudioHost`] so the same pipeline can run against real hardware
//! ([`super::cpal_host::CpalHost`]) or deterministic test devices
//! ([`super::synthetic::SyntheticHost`]).

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// An input-capable device as reported by the host at the last refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    /// Position of the device in the host's device table.
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
}

/// Parameters for opening a hardware input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub device_index: usize,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Receives one buffer of interleaved samples per hardware callback.
///
/// Runs on the audio layer's thread: it must not block.
pub type DataCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Receives stream faults (device unplugged, driver errors).
pub type ErrorCallback = Box<dyn FnMut(String) + Send + 'static>;

/// An open input stream. Capture stops when the value is dropped.
pub trait InputStream {}

/// Host audio layer: device table plus input stream primitives.
pub trait AudioHost: Send + Sync {
    /// Re-initialize the device table so hot-plugged devices show up.
    fn refresh(&self) -> Result<()>;

    /// Every device in the table as of the last refresh, including ones
    /// without input channels.
    fn devices(&self) -> Result<Vec<InputDevice>>;

    /// Open and start an input stream. Callbacks fire until the returned
    /// stream is dropped.
    fn open_input(
        &self,
        request: StreamRequest,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn InputStream>, RecorderError>;
}
