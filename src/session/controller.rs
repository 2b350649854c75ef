//! Recording session orchestrator.
//!
//! Manages the dual-device pipeline:
//! select devices → start recorders → stop and join → mix → idle
//!
//! The controller is driven from one thread; only the recorders' own
//! producer/consumer pairs run in parallel.

use std::path::{Path, PathBuf};

use crate::audio::{
    mixed_path_for, AudioMixer, DeviceCatalog, InputDevice, MixSummary, RecordingSummary,
    StreamRecorder, DEFAULT_SAMPLE_RATE,
};

use super::error::SessionError;
use super::status::{SessionPhase, StatusSender};

/// Where and how sessions are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub savedir: PathBuf,
    pub sample_rate: u32,
}

impl SessionSettings {
    pub fn new(savedir: impl Into<PathBuf>) -> Self {
        Self {
            savedir: savedir.into(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

/// One recording started by `start_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub slot: u8,
    pub device: InputDevice,
    pub path: PathBuf,
}

/// Result returned from starting a session.
#[derive(Debug, Clone)]
pub struct SessionStartResult {
    pub session_id: String,
    pub tracks: Vec<TrackInfo>,
}

/// Result returned from stopping a session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub tracks: Vec<RecordingSummary>,
    pub mixed: Option<MixSummary>,
}

struct SessionTrack {
    slot: u8,
    device: InputDevice,
    recorder: StreamRecorder,
    fault_reported: bool,
}

struct ActiveSession {
    id: String,
    tracks: Vec<SessionTrack>,
}

pub struct SessionController {
    catalog: DeviceCatalog,
    settings: SessionSettings,
    status: StatusSender,
    phase: SessionPhase,
    session: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(catalog: DeviceCatalog, settings: SessionSettings, status: StatusSender) -> Self {
        Self {
            catalog,
            settings,
            status,
            phase: SessionPhase::Idle,
            session: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Number of tracks in the active session that are still capturing.
    pub fn live_tracks(&self) -> usize {
        self.session.as_ref().map_or(0, |session| {
            session
                .tracks
                .iter()
                .filter(|t| t.recorder.is_recording())
                .count()
        })
    }

    /// Announce tracks whose capture ended on a device error since the last
    /// check. Returns how many were newly reported. Does not block.
    pub fn check_faults(&mut self) -> usize {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };

        let mut reported = 0;
        for track in session.tracks.iter_mut().filter(|t| !t.fault_reported) {
            if let Some(reason) = track.recorder.fault() {
                self.status.error(
                    self.phase,
                    format!(
                        "[{}] stopped capturing: {}; stop to keep what was recorded",
                        track.device.name, reason
                    ),
                );
                track.fault_reported = true;
                reported += 1;
            }
        }
        reported
    }

    /// Re-query the host for input devices and announce the result.
    pub fn refresh_devices(&self) -> Vec<InputDevice> {
        let devices = self.catalog.list_input_devices();
        self.status.info(
            self.phase,
            format!("Device list refreshed: {} input devices", devices.len()),
        );
        devices
    }

    /// Start recording the devices selected (by display name) for slot 1
    /// and slot 2. Either slot may be empty, but not both.
    pub fn start_session(
        &mut self,
        slot1: Option<&str>,
        slot2: Option<&str>,
    ) -> Result<SessionStartResult, SessionError> {
        if self.session.is_some() {
            self.status.error(self.phase, "Recording is already in progress");
            return Err(SessionError::AlreadyActive);
        }

        self.status.info(self.phase, "Start requested");

        let selected = self.resolve_selection([(1, slot1), (2, slot2)]);
        if selected.is_empty() {
            self.status.error(self.phase, "No device selected; recording not started");
            return Err(SessionError::NoDeviceSelected);
        }
        if let [(_, first), (_, second)] = selected.as_slice() {
            if first.index == second.index {
                self.status.error(
                    self.phase,
                    format!("[{}] is selected for both slots", first.name),
                );
                return Err(SessionError::DuplicateDevice {
                    name: first.name.clone(),
                });
            }
        }

        let savedir = self.settings.savedir.clone();
        if let Err(source) = std::fs::create_dir_all(&savedir) {
            self.status.error(
                self.phase,
                format!("Cannot create {}: {}", savedir.display(), source),
            );
            return Err(SessionError::CreateDir {
                path: savedir,
                source,
            });
        }

        let session_id = next_session_id(&savedir);
        let mut tracks: Vec<SessionTrack> = Vec::with_capacity(selected.len());

        // Start back to back so both captures begin close together.
        for (slot, device) in selected {
            let path = savedir.join(format!("{session_id}_{slot}.wav"));
            let mut recorder = StreamRecorder::new(
                self.catalog.host(),
                &path,
                device.index,
                device.max_input_channels,
            )
            .with_sample_rate(self.settings.sample_rate);

            if let Err(source) = recorder.start_recording() {
                self.status.error(
                    self.phase,
                    format!("[{}] failed to start: {}", device.name, source),
                );
                abort_tracks(tracks);
                return Err(SessionError::Recorder { slot, source });
            }
            tracks.push(SessionTrack {
                slot,
                device,
                recorder,
                fault_reported: false,
            });
        }

        self.phase = SessionPhase::Recording;
        let infos: Vec<TrackInfo> = tracks
            .iter()
            .map(|t| TrackInfo {
                slot: t.slot,
                device: t.device.clone(),
                path: t.recorder.filename().to_path_buf(),
            })
            .collect();
        for info in &infos {
            self.status.info(
                self.phase,
                format!(
                    "Recording [{}] to {}",
                    info.device.name,
                    info.path.display()
                ),
            );
        }

        self.session = Some(ActiveSession {
            id: session_id.clone(),
            tracks,
        });

        Ok(SessionStartResult {
            session_id,
            tracks: infos,
        })
    }

    /// Stop every recorder, wait for their files to close, and mix when two
    /// tracks were recorded. Blocks for the whole duration; keep it off
    /// interactive threads.
    pub fn stop_session(&mut self) -> Result<SessionOutcome, SessionError> {
        let Some(session) = self.session.take() else {
            self.status.warn(self.phase, "Stop requested but nothing is recording");
            return Err(SessionError::NotRecording);
        };

        self.phase = SessionPhase::Stopping;
        self.status.info(self.phase, "Stop requested");

        let track_count = session.tracks.len();
        let mut summaries = Vec::with_capacity(track_count);
        let mut failure: Option<SessionError> = None;

        for mut track in session.tracks {
            match track.recorder.stop_recording() {
                Ok(summary) => {
                    self.status.info(
                        self.phase,
                        format!(
                            "[{}] saved {} ({:.1}s)",
                            track.device.name,
                            summary.path.display(),
                            summary.duration_seconds()
                        ),
                    );
                    summaries.push(summary);
                }
                Err(source) => {
                    self.status.error(
                        self.phase,
                        format!("[{}] recording failed: {}", track.device.name, source),
                    );
                    if failure.is_none() {
                        failure = Some(SessionError::Recorder {
                            slot: track.slot,
                            source,
                        });
                    }
                }
            }
        }
        self.status.info(self.phase, "Recording stopped");

        if let Some(err) = failure {
            if track_count == 2 {
                self.status
                    .error(self.phase, "Mix skipped because a recording failed");
            }
            self.phase = SessionPhase::Idle;
            return Err(err);
        }

        let mixed = match summaries.as_slice() {
            [first, second] => match self.mix_tracks(&first.path, &second.path) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    self.phase = SessionPhase::Idle;
                    return Err(e);
                }
            },
            _ => None,
        };

        self.phase = SessionPhase::Idle;
        Ok(SessionOutcome {
            session_id: session.id,
            tracks: summaries,
            mixed,
        })
    }

    fn resolve_selection(&self, slots: [(u8, Option<&str>); 2]) -> Vec<(u8, InputDevice)> {
        let wanted: Vec<(u8, &str)> = slots
            .into_iter()
            .filter_map(|(slot, name)| {
                name.map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(|n| (slot, n))
            })
            .collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        let devices = self.catalog.list_input_devices();
        let mut selected = Vec::with_capacity(wanted.len());
        for (slot, name) in wanted {
            match devices.iter().find(|d| d.name == name) {
                Some(device) => selected.push((slot, device.clone())),
                None => self.status.warn(
                    self.phase,
                    format!("Slot {slot}: device [{name}] is not available"),
                ),
            }
        }
        selected
    }

    fn mix_tracks(&mut self, first: &Path, second: &Path) -> Result<MixSummary, SessionError> {
        self.phase = SessionPhase::Mixing;
        self.status.info(self.phase, "Mixing 2 recordings");

        let output = mixed_path_for(first);
        match AudioMixer::mix(first, second, &output) {
            Ok(summary) => {
                self.status
                    .info(self.phase, format!("Mix complete: {}", output.display()));
                Ok(summary)
            }
            Err(e) => {
                self.status.error(self.phase, format!("Mix failed: {e}"));
                Err(e.into())
            }
        }
    }
}

/// Stop recorders that started before a later slot failed, and discard
/// their files.
fn abort_tracks(tracks: Vec<SessionTrack>) {
    for mut track in tracks {
        let _ = track.recorder.stop_recording();
        let _ = std::fs::remove_file(track.recorder.filename());
    }
}

/// Timestamp id shared by every file of a session, made unique within
/// `savedir`.
fn next_session_id(savedir: &Path) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let taken = |id: &str| {
        ["_1.wav", "_2.wav", ".wav"]
            .iter()
            .any(|suffix| savedir.join(format!("{id}{suffix}")).exists())
    };

    if !taken(&timestamp) {
        return timestamp;
    }
    for i in 1..100 {
        let candidate = format!("{timestamp}-{i}");
        if !taken(&candidate) {
            return candidate;
        }
    }
    timestamp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::host::{
        AudioHost, DataCallback, ErrorCallback, InputStream, StreamRequest,
    };
    use crate::audio::{RecorderError, SyntheticDevice, SyntheticHost};
    use crate::session::status::{self, StatusEvent, StatusLevel};
    use crossbeam_channel::Receiver;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn controller(
        dir: &Path,
        devices: Vec<SyntheticDevice>,
    ) -> (SessionController, Receiver<StatusEvent>) {
        let host = Arc::new(SyntheticHost::new(devices));
        let (status, rx) = status::channel();
        let controller = SessionController::new(
            DeviceCatalog::new(host),
            SessionSettings::new(dir.join("records")),
            status,
        );
        (controller, rx)
    }

    fn two_devices() -> Vec<SyntheticDevice> {
        vec![
            SyntheticDevice::new("Mic", 1, 440.0),
            SyntheticDevice::new("Loopback", 2, 660.0),
        ]
    }

    fn wav_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    #[test]
    fn test_no_selection_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut controller, rx) = controller(dir.path(), two_devices());

        let err = controller.start_session(None, Some("  ")).unwrap_err();
        assert!(matches!(err, SessionError::NoDeviceSelected));
        assert!(!controller.is_recording());
        assert!(!dir.path().join("records").exists());

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.last().unwrap().level, StatusLevel::Error);
    }

    #[test]
    fn test_unknown_device_counts_as_none() {
        let dir = TempDir::new().unwrap();
        let (mut controller, rx) = controller(dir.path(), two_devices());

        let err = controller.start_session(Some("Unplugged"), None).unwrap_err();
        assert!(matches!(err, SessionError::NoDeviceSelected));
        assert!(rx
            .try_iter()
            .any(|e| e.level == StatusLevel::Warn && e.message.contains("Unplugged")));
    }

    #[test]
    fn test_same_device_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut controller, _rx) = controller(dir.path(), two_devices());

        let err = controller.start_session(Some("Mic"), Some("Mic")).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateDevice { .. }));
        assert!(!controller.is_recording());
    }

    #[test]
    fn test_single_slot_records_without_mix() {
        let dir = TempDir::new().unwrap();
        let (mut controller, _rx) = controller(dir.path(), two_devices());

        let started = controller.start_session(None, Some("Loopback")).unwrap();
        assert_eq!(started.tracks.len(), 1);
        assert_eq!(started.tracks[0].slot, 2);
        assert_eq!(controller.phase(), SessionPhase::Recording);

        std::thread::sleep(Duration::from_millis(100));
        let outcome = controller.stop_session().unwrap();

        assert!(outcome.mixed.is_none());
        assert_eq!(outcome.tracks.len(), 1);
        assert_eq!(outcome.tracks[0].channels, 2);
        assert_eq!(
            wav_files(&dir.path().join("records")),
            vec![dir
                .path()
                .join("records")
                .join(format!("{}_2.wav", outcome.session_id))]
        );
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_each_track_uses_its_own_channel_count() {
        let dir = TempDir::new().unwrap();
        let (mut controller, _rx) = controller(dir.path(), two_devices());

        controller.start_session(Some("Mic"), Some("Loopback")).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        let outcome = controller.stop_session().unwrap();

        assert_eq!(outcome.tracks[0].channels, 1);
        assert_eq!(outcome.tracks[1].channels, 2);
        assert_eq!(outcome.mixed.unwrap().channels, 2);
    }

    #[test]
    fn test_second_start_while_active() {
        let dir = TempDir::new().unwrap();
        let (mut controller, _rx) = controller(dir.path(), two_devices());

        controller.start_session(Some("Mic"), None).unwrap();
        let err = controller.start_session(Some("Loopback"), None).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyActive));
        controller.stop_session().unwrap();
    }

    #[test]
    fn test_stop_without_session() {
        let dir = TempDir::new().unwrap();
        let (mut controller, _rx) = controller(dir.path(), two_devices());
        assert!(matches!(
            controller.stop_session(),
            Err(SessionError::NotRecording)
        ));
    }

    #[test]
    fn test_controller_is_reusable() {
        let dir = TempDir::new().unwrap();
        let (mut controller, _rx) = controller(dir.path(), two_devices());

        let first = controller.start_session(Some("Mic"), None).unwrap();
        controller.stop_session().unwrap();
        let second = controller.start_session(Some("Mic"), None).unwrap();
        controller.stop_session().unwrap();

        // Same second, distinct files.
        assert_ne!(first.tracks[0].path, second.tracks[0].path);
    }

    #[test]
    fn test_refresh_announces_count() {
        let dir = TempDir::new().unwrap();
        let mut devices = two_devices();
        devices.push(SyntheticDevice::new("Speakers", 0, 0.0));
        let (controller, rx) = controller(dir.path(), devices);

        assert_eq!(controller.refresh_devices().len(), 2);
        let event = rx.try_recv().unwrap();
        assert!(event.message.contains("2 input devices"));
    }

    /// Delegates to a synthetic host but refuses to open one device.
    struct BrokenSlotHost {
        inner: SyntheticHost,
        broken_index: usize,
    }

    impl AudioHost for BrokenSlotHost {
        fn refresh(&self) -> anyhow::Result<()> {
            self.inner.refresh()
        }

        fn devices(&self) -> anyhow::Result<Vec<InputDevice>> {
            self.inner.devices()
        }

        fn open_input(
            &self,
            request: StreamRequest,
            on_data: DataCallback,
            on_error: ErrorCallback,
        ) -> Result<Box<dyn InputStream>, RecorderError> {
            if request.device_index == self.broken_index {
                return Err(RecorderError::StreamOpen {
                    device_index: request.device_index,
                    reason: "device busy".to_string(),
                });
            }
            self.inner.open_input(request, on_data, on_error)
        }
    }

    #[test]
    fn test_failed_second_start_rolls_back_first() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(BrokenSlotHost {
            inner: SyntheticHost::new(two_devices()),
            broken_index: 1,
        });
        let mut controller = SessionController::new(
            DeviceCatalog::new(host),
            SessionSettings::new(dir.path()),
            StatusSender::log_only(),
        );

        let err = controller.start_session(Some("Mic"), Some("Loopback")).unwrap_err();
        match err {
            SessionError::Recorder { slot, source } => {
                assert_eq!(slot, 2);
                assert!(source.is_hardware());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!controller.is_recording());
        assert!(wav_files(dir.path()).is_empty());
    }

    #[test]
    fn test_hardware_fault_skips_mix() {
        let dir = TempDir::new().unwrap();
        let (mut controller, rx) = controller(
            dir.path(),
            vec![
                SyntheticDevice::new("Mic", 1, 440.0),
                SyntheticDevice::new("Flaky", 1, 660.0).failing_after(Duration::from_millis(50)),
            ],
        );

        let started = controller.start_session(Some("Mic"), Some("Flaky")).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        let err = controller.stop_session().unwrap_err();

        assert!(matches!(err, SessionError::Recorder { slot: 2, .. }));
        assert!(!mixed_path_for(&started.tracks[0].path).exists());
        assert!(rx.try_iter().any(|e| e.message.contains("Mix skipped")));
        assert!(!controller.is_recording());
    }

    #[test]
    fn test_device_fault_is_announced_while_recording() {
        let dir = TempDir::new().unwrap();
        let (mut controller, rx) = controller(
            dir.path(),
            vec![
                SyntheticDevice::new("Mic", 1, 440.0),
                SyntheticDevice::new("Flaky", 1, 660.0).failing_after(Duration::from_millis(50)),
            ],
        );

        controller.start_session(Some("Mic"), Some("Flaky")).unwrap();
        assert_eq!(controller.live_tracks(), 2);
        assert_eq!(controller.check_faults(), 0);

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(controller.check_faults(), 1);
        assert_eq!(controller.live_tracks(), 1);
        assert_eq!(controller.phase(), SessionPhase::Recording);

        let fault_events: Vec<_> = rx
            .try_iter()
            .filter(|e| e.level == StatusLevel::Error)
            .collect();
        assert_eq!(fault_events.len(), 1);
        assert!(fault_events[0].message.contains("[Flaky] stopped capturing"));

        // Reported once only.
        assert_eq!(controller.check_faults(), 0);

        assert!(controller.stop_session().is_err());
        assert_eq!(controller.live_tracks(), 0);
        assert_eq!(controller.check_faults(), 0);
    }
}
