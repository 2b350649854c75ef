//! Deterministic in-process audio devices.
//!
//! Each device produces a sine wave in real time on its own thread, so the
//! recorder sees the same callback pattern as with hardware. Used by the test
//! suite and by `duorec record --synthetic`.

use anyhow::{anyhow, Result};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

use super::error::RecorderError;
use super::host::{
    AudioHost, DataCallback, ErrorCallback, InputDevice, InputStream, StreamRequest,
};

const DEFAULT_BUFFER_FRAMES: usize = 441;

#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    pub name: String,
    /// Input channels; zero models an output-only device.
    pub channels: u16,
    pub frequency: f32,
    pub amplitude: f32,
    pub buffer_frames: usize,
    /// Report a stream fault once this much audio has been delivered.
    pub fail_after: Option<Duration>,
}

impl SyntheticDevice {
    pub fn new(name: impl Into<String>, channels: u16, frequency: f32) -> Self {
        Self {
            name: name.into(),
            channels,
            frequency,
            amplitude: 0.5,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            fail_after: None,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames.max(1);
        self
    }

    pub fn failing_after(mut self, after: Duration) -> Self {
        self.fail_after = Some(after);
        self
    }

    /// Value of every channel at `frame`.
    pub fn sample(&self, frame: u64, sample_rate: u32) -> f32 {
        let t = frame as f64 / sample_rate as f64;
        self.amplitude * (TAU * self.frequency * t as f32).sin()
    }
}

/// Host whose device table is a list of [`SyntheticDevice`]s.
///
/// Devices plugged or unplugged after construction only become visible after
/// the next [`AudioHost::refresh`], like a real host's cached table.
pub struct SyntheticHost {
    attached: Mutex<Vec<SyntheticDevice>>,
    table: Mutex<Vec<SyntheticDevice>>,
}

impl SyntheticHost {
    pub fn new(devices: Vec<SyntheticDevice>) -> Self {
        Self {
            attached: Mutex::new(devices.clone()),
            table: Mutex::new(devices),
        }
    }

    /// A mono input, a stereo input and an output-only device.
    pub fn demo() -> Self {
        Self::new(vec![
            SyntheticDevice::new("Synthetic Mic", 1, 440.0),
            SyntheticDevice::new("Synthetic Loopback", 2, 660.0),
            SyntheticDevice::new("Synthetic Speakers", 0, 0.0),
        ])
    }

    pub fn plug(&self, device: SyntheticDevice) {
        if let Ok(mut attached) = self.attached.lock() {
            attached.push(device);
        }
    }

    pub fn unplug(&self, name: &str) {
        if let Ok(mut attached) = self.attached.lock() {
            attached.retain(|d| d.name != name);
        }
    }

    fn device_at(&self, index: usize) -> Option<SyntheticDevice> {
        self.table.lock().ok()?.get(index).cloned()
    }
}

impl AudioHost for SyntheticHost {
    fn refresh(&self) -> Result<()> {
        let attached = self
            .attached
            .lock()
            .map_err(|_| anyhow!("synthetic device list poisoned"))?
            .clone();
        let mut table = self
            .table
            .lock()
            .map_err(|_| anyhow!("synthetic device table poisoned"))?;
        *table = attached;
        Ok(())
    }

    fn devices(&self) -> Result<Vec<InputDevice>> {
        let table = self
            .table
            .lock()
            .map_err(|_| anyhow!("synthetic device table poisoned"))?;
        Ok(table
            .iter()
            .enumerate()
            .map(|(index, d)| InputDevice {
                index,
                name: d.name.clone(),
                max_input_channels: d.channels,
            })
            .collect())
    }

    fn open_input(
        &self,
        request: StreamRequest,
        mut on_data: DataCallback,
        mut on_error: ErrorCallback,
    ) -> Result<Box<dyn InputStream>, RecorderError> {
        let device = self
            .device_at(request.device_index)
            .ok_or(RecorderError::DeviceNotFound {
                device_index: request.device_index,
            })?;

        if request.channels == 0 || request.channels > device.channels {
            return Err(RecorderError::StreamOpen {
                device_index: request.device_index,
                reason: format!(
                    "{} channels requested, device has {}",
                    request.channels, device.channels
                ),
            });
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let channels = request.channels as usize;
        let sample_rate = request.sample_rate;
        let period = Duration::from_secs_f64(device.buffer_frames as f64 / sample_rate as f64);

        let worker = std::thread::Builder::new()
            .name(format!("synthetic-{}", request.device_index))
            .spawn(move || {
                let started = Instant::now();
                let mut frame: u64 = 0;
                let mut buffer = vec![0.0f32; device.buffer_frames * channels];
                let mut delivered = 0u32;

                while flag.load(Ordering::Acquire) {
                    delivered += 1;
                    let deadline = started + period * delivered;
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                    if !flag.load(Ordering::Acquire) {
                        break;
                    }

                    if let Some(after) = device.fail_after {
                        if started.elapsed() >= after {
                            on_error(format!("{} disconnected", device.name));
                            break;
                        }
                    }

                    for chunk in buffer.chunks_mut(channels) {
                        chunk.fill(device.sample(frame, sample_rate));
                        frame += 1;
                    }
                    on_data(&buffer);
                }
                debug!("Synthetic device {} delivered {} frames", device.name, frame);
            })
            .map_err(|e| RecorderError::StreamOpen {
                device_index: request.device_index,
                reason: e.to_string(),
            })?;

        Ok(Box::new(SyntheticStream {
            running,
            worker: Some(worker),
        }))
    }
}

struct SyntheticStream {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl InputStream for SyntheticStream {}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
