//! Per-device recorder: hardware callback → unbounded queue → disk.
//!
//! The audio layer's callback only copies each buffer into an [`AudioChunk`]
//! and pushes it onto an unbounded channel. A dedicated thread owns the WAV
//! writer and the input stream; it converts chunks to 16-bit PCM and writes
//! them in arrival order. Stopping closes the stream, drains whatever is
//! still queued, finalizes the file, and hands the result back through the
//! thread's join handle.
//!
//! The queue never drops samples. Under sustained slow disk I/O it grows
//! without bound instead.
//!
//! A fatal stream error ends capture early. The recorder thread records the
//! reason before it closes the file, so [`StreamRecorder::state`] reports
//! [`RecorderState::Faulted`] right away; the error itself is returned by the
//! following `stop_recording`.

use crossbeam_channel::{bounded, never, select, unbounded, Receiver, Sender};
use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::RecorderError;
use super::host::{AudioHost, StreamRequest};
use super::pcm;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Interleaved samples from one hardware callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Box<[f32]>,
}

impl AudioChunk {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<&[f32]> for AudioChunk {
    fn from(samples: &[f32]) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    /// Capture ended on an error; `stop_recording` still has to collect it.
    Faulted,
    StopRequested,
    Stopped,
}

/// What a finished recording left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: u64,
    pub chunks: u64,
}

impl RecordingSummary {
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

type WavFileWriter = WavWriter<BufWriter<File>>;

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<Result<RecordingSummary, RecorderError>>,
}

pub struct StreamRecorder {
    host: Arc<dyn AudioHost>,
    filename: PathBuf,
    device_index: usize,
    channels: u16,
    sample_rate: u32,
    state: RecorderState,
    fault: Arc<OnceLock<String>>,
    worker: Option<Worker>,
}

impl StreamRecorder {
    pub fn new(
        host: Arc<dyn AudioHost>,
        filename: impl Into<PathBuf>,
        device_index: usize,
        channels: u16,
    ) -> Self {
        Self {
            host,
            filename: filename.into(),
            device_index,
            channels,
            sample_rate: DEFAULT_SAMPLE_RATE,
            state: RecorderState::Idle,
            fault: Arc::new(OnceLock::new()),
            worker: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> RecorderState {
        if self.state == RecorderState::Recording && self.fault.get().is_some() {
            RecorderState::Faulted
        } else {
            self.state
        }
    }

    /// Why the current capture ended early, if it did.
    pub fn fault(&self) -> Option<&str> {
        self.fault.get().map(String::as_str)
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Open the output file and the input stream, then start capturing.
    ///
    /// Returns once the stream is running. Open failures are reported here
    /// after the recorder thread has released the file.
    pub fn start_recording(&mut self) -> Result<(), RecorderError> {
        if self.worker.is_some() {
            return Err(RecorderError::AlreadyRecording {
                device_index: self.device_index,
            });
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<(), RecorderError>>(1);
        self.fault = Arc::new(OnceLock::new());

        let job = CaptureJob {
            host: Arc::clone(&self.host),
            fault: Arc::clone(&self.fault),
            path: self.filename.clone(),
            request: StreamRequest {
                device_index: self.device_index,
                channels: self.channels,
                sample_rate: self.sample_rate,
            },
        };

        let handle = std::thread::Builder::new()
            .name(format!("recorder-{}", self.device_index))
            .spawn(move || job.run(stop_rx, ready_tx))
            .map_err(|source| RecorderError::Io {
                path: self.filename.clone(),
                source,
            })?;

        let ready = ready_rx.recv().unwrap_or(Err(RecorderError::WorkerPanicked {
            device_index: self.device_index,
        }));

        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        self.worker = Some(Worker { stop_tx, handle });
        self.state = RecorderState::Recording;
        info!(
            "Recording device {} to {:?} ({} ch, {} Hz)",
            self.device_index, self.filename, self.channels, self.sample_rate
        );
        Ok(())
    }

    /// Stop capturing and wait until every queued chunk is on disk and the
    /// file is closed.
    pub fn stop_recording(&mut self) -> Result<RecordingSummary, RecorderError> {
        let worker = self.worker.take().ok_or(RecorderError::NotRecording {
            device_index: self.device_index,
        })?;

        self.state = RecorderState::StopRequested;
        debug!("Stop requested for device {}", self.device_index);

        // The thread may already have exited on a stream fault.
        let _ = worker.stop_tx.send(());
        let result = worker
            .handle
            .join()
            .unwrap_or(Err(RecorderError::WorkerPanicked {
                device_index: self.device_index,
            }));

        self.state = RecorderState::Stopped;
        match &result {
            Ok(summary) => info!(
                "Recording of device {} finished: {:?}, {} frames in {} chunks",
                self.device_index, summary.path, summary.frames, summary.chunks
            ),
            Err(e) => error!("Recording of device {} failed: {}", self.device_index, e),
        }
        result
    }
}

impl Drop for StreamRecorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("Dropping active StreamRecorder, stopping capture");
            let _ = self.stop_recording();
        }
    }
}

/// Everything the recorder thread needs, moved onto it at start.
struct CaptureJob {
    host: Arc<dyn AudioHost>,
    fault: Arc<OnceLock<String>>,
    path: PathBuf,
    request: StreamRequest,
}

impl CaptureJob {
    fn run(
        self,
        stop_rx: Receiver<()>,
        ready_tx: Sender<Result<(), RecorderError>>,
    ) -> Result<RecordingSummary, RecorderError> {
        let spec = WavSpec {
            channels: self.request.channels,
            sample_rate: self.request.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        // Open failures go back through `ready_tx`; the join result is then discarded.
        let mut writer = match WavWriter::create(&self.path, spec) {
            Ok(writer) => writer,
            Err(source) => {
                let _ = ready_tx.send(Err(self.wav_error(source)));
                return Ok(self.summary(0, 0));
            }
        };

        let (chunk_tx, chunk_rx) = unbounded::<AudioChunk>();
        let (fault_tx, fault_rx) = unbounded::<String>();

        let stream = self.host.open_input(
            self.request,
            Box::new(move |samples: &[f32]| {
                let _ = chunk_tx.send(AudioChunk::from(samples));
            }),
            Box::new(move |reason: String| {
                let _ = fault_tx.send(reason);
            }),
        );

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                drop(writer);
                if let Err(io) = std::fs::remove_file(&self.path) {
                    warn!("Failed to remove {:?} after open failure: {}", self.path, io);
                }
                let _ = ready_tx.send(Err(e));
                return Ok(self.summary(0, 0));
            }
        };

        let _ = ready_tx.send(Ok(()));

        let mut frames = 0u64;
        let mut chunks = 0u64;
        let mut outcome = self.pump(
            &chunk_rx,
            &stop_rx,
            &fault_rx,
            &mut writer,
            &mut frames,
            &mut chunks,
        );

        if outcome.is_ok() {
            if let Ok(reason) = fault_rx.try_recv() {
                outcome = Err(self.stream_error(reason));
            }
        }
        if let Err(e) = &outcome {
            warn!("Capture on device {} ended early: {}", self.request.device_index, e);
            let _ = self.fault.set(e.to_string());
        }

        // No callbacks fire after this point, so the queue holds everything
        // captured before the stop.
        drop(stream);
        for chunk in chunk_rx.try_iter() {
            if let Err(e) = self.write_chunk(&mut writer, &chunk, &mut frames, &mut chunks) {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
                break;
            }
        }

        let finalized = writer.finalize().map_err(|source| self.wav_error(source));
        outcome?;
        finalized?;

        Ok(self.summary(frames, chunks))
    }

    fn pump(
        &self,
        chunk_rx: &Receiver<AudioChunk>,
        stop_rx: &Receiver<()>,
        fault_rx: &Receiver<String>,
        writer: &mut WavFileWriter,
        frames: &mut u64,
        chunks: &mut u64,
    ) -> Result<(), RecorderError> {
        // A host may release its error callback early; that only means no
        // further faults will arrive.
        let closed = never::<String>();
        let mut faults_open = true;

        loop {
            let faults = if faults_open { fault_rx } else { &closed };
            select! {
                recv(chunk_rx) -> msg => match msg {
                    Ok(chunk) => self.write_chunk(writer, &chunk, frames, chunks)?,
                    Err(_) => return Ok(()),
                },
                recv(stop_rx) -> _ => return Ok(()),
                recv(faults) -> msg => match msg {
                    Ok(reason) => return Err(self.stream_error(reason)),
                    Err(_) => {
                        debug!("Fault channel closed for device {}", self.request.device_index);
                        faults_open = false;
                    }
                },
            }
        }
    }

    fn write_chunk(
        &self,
        writer: &mut WavFileWriter,
        chunk: &AudioChunk,
        frames: &mut u64,
        chunks: &mut u64,
    ) -> Result<(), RecorderError> {
        for &sample in chunk.samples() {
            writer
                .write_sample(pcm::sample_to_i16(sample))
                .map_err(|source| self.wav_error(source))?;
        }
        *frames += (chunk.len() / self.request.channels.max(1) as usize) as u64;
        *chunks += 1;
        Ok(())
    }

    fn stream_error(&self, reason: String) -> RecorderError {
        RecorderError::Stream {
            device_index: self.request.device_index,
            reason,
        }
    }

    fn wav_error(&self, source: hound::Error) -> RecorderError {
        match source {
            hound::Error::IoError(source) => RecorderError::Io {
                path: self.path.clone(),
                source,
            },
            source => RecorderError::Wav {
                path: self.path.clone(),
                source,
            },
        }
    }

    fn summary(&self, frames: u64, chunks: u64) -> RecordingSummary {
        RecordingSummary {
            path: self.path.clone(),
            channels: self.request.channels,
            sample_rate: self.request.sample_rate,
            frames,
            chunks,
        }
    }
}
