//! Hardware audio host backed by cpal.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::error::RecorderError;
use super::host::{
    AudioHost, DataCallback, ErrorCallback, InputDevice, InputStream, StreamRequest,
};
use super::pcm;

/// cpal's default host with a cached snapshot of its device table.
///
/// The snapshot only holds plain data; cpal handles are re-acquired on the
/// recorder thread that opens the stream, since streams cannot move between
/// threads.
#[derive(Default)]
pub struct CpalHost {
    table: Mutex<Vec<InputDevice>>,
}

impl CpalHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_entry(&self, index: usize) -> Option<InputDevice> {
        self.table.lock().ok()?.get(index).cloned()
    }
}

fn max_input_channels(device: &cpal::Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

/// Backend-specific errors (xruns and similar glitches) leave the stream
/// usable; anything else means the device is gone.
fn ends_capture(err: &cpal::StreamError) -> bool {
    !matches!(err, cpal::StreamError::BackendSpecific { .. })
}

/// Pick the sample format for a stream, preferring float input.
fn pick_format(
    configs: &[SupportedStreamConfigRange],
    channels: u16,
    sample_rate: u32,
) -> Option<SampleFormat> {
    let usable: Vec<SampleFormat> = configs
        .iter()
        .filter(|c| {
            c.channels() == channels
                && c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
        })
        .map(|c| c.sample_format())
        .collect();

    [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16]
        .into_iter()
        .find(|format| usable.contains(format))
}

impl AudioHost for CpalHost {
    fn refresh(&self) -> Result<()> {
        let host = cpal::default_host();
        let devices = host.devices().context("Failed to enumerate audio devices")?;

        let snapshot: Vec<InputDevice> = devices
            .enumerate()
            .map(|(index, device)| InputDevice {
                index,
                name: device.name().unwrap_or_else(|_| "unknown".to_string()),
                max_input_channels: max_input_channels(&device),
            })
            .collect();

        debug!("cpal host {:?} reports {} devices", host.id(), snapshot.len());

        let mut table = self
            .table
            .lock()
            .map_err(|_| anyhow!("device table lock poisoned"))?;
        *table = snapshot;
        Ok(())
    }

    fn devices(&self) -> Result<Vec<InputDevice>> {
        let table = self
            .table
            .lock()
            .map_err(|_| anyhow!("device table lock poisoned"))?;
        Ok(table.clone())
    }

    fn open_input(
        &self,
        request: StreamRequest,
        mut on_data: DataCallback,
        mut on_error: ErrorCallback,
    ) -> Result<Box<dyn InputStream>, RecorderError> {
        let device_index = request.device_index;
        let open_failed = |reason: String| RecorderError::StreamOpen {
            device_index,
            reason,
        };

        let expected = self
            .table_entry(device_index)
            .ok_or(RecorderError::DeviceNotFound { device_index })?;

        let host = cpal::default_host();
        let device = host
            .devices()
            .map_err(|e| open_failed(e.to_string()))?
            .nth(device_index)
            .filter(|d| d.name().ok().as_deref() == Some(expected.name.as_str()))
            .ok_or(RecorderError::DeviceNotFound { device_index })?;

        let configs: Vec<SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| open_failed(e.to_string()))?
            .collect();

        let format = pick_format(&configs, request.channels, request.sample_rate).ok_or_else(
            || {
                open_failed(format!(
                    "no supported config for {} channels at {} Hz",
                    request.channels, request.sample_rate
                ))
            },
        )?;

        let config = cpal::StreamConfig {
            channels: request.channels,
            sample_rate: cpal::SampleRate(request.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = move |err: cpal::StreamError| {
            if ends_capture(&err) {
                error!("Input stream error: {}", err);
                on_error(err.to_string());
            } else {
                warn!("Input stream glitch, continuing: {}", err);
            }
        };

        let stream = match format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| on_data(data),
                err_fn,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| pcm::i16_to_sample(s)));
                        on_data(&scratch);
                    },
                    err_fn,
                    None,
                )
            }
            _ => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0));
                        on_data(&scratch);
                    },
                    err_fn,
                    None,
                )
            }
        }
        .map_err(|e| open_failed(e.to_string()))?;

        stream.play().map_err(|e| open_failed(e.to_string()))?;

        info!(
            "Opened input stream on {} ({} ch, {} Hz, {:?})",
            expected.name, request.channels, request.sample_rate, format
        );
        Ok(Box::new(CpalStream { _stream: stream }))
    }
}

struct CpalStream {
    _stream: cpal::Stream,
}

impl InputStream for CpalStream {}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{BackendSpecificError, StreamError};

    #[test]
    fn test_only_lost_devices_end_capture() {
        let xrun = StreamError::BackendSpecific {
            err: BackendSpecificError {
                description: "buffer overrun".to_string(),
            },
        };
        assert!(!ends_capture(&xrun));
        assert!(ends_capture(&StreamError::DeviceNotAvailable));
    }

    #[test]
    fn test_pick_format_prefers_float() {
        let range = |format| {
            SupportedStreamConfigRange::new(
                2,
                cpal::SampleRate(8000),
                cpal::SampleRate(96000),
                cpal::SupportedBufferSize::Unknown,
                format,
            )
        };
        let configs = vec![range(SampleFormat::I16), range(SampleFormat::F32)];

        assert_eq!(pick_format(&configs, 2, 44100), Some(SampleFormat::F32));
        assert_eq!(pick_format(&configs[..1], 2, 44100), Some(SampleFormat::I16));
        assert_eq!(pick_format(&configs, 1, 44100), None);
        assert_eq!(pick_format(&configs, 2, 192000), None);
    }
}
