//! Post-recording mix of two finished WAV files.
//!
//! The overlay itself is a pure function over decoded tracks; file decoding
//! and encoding wrap around it.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::MixError;
use super::pcm;

/// A fully decoded 16-bit track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved samples.
    pub samples: Vec<i16>,
}

impl Track {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duplicate a mono track into `channels` identical channels.
    fn upmix(&self, channels: u16) -> Track {
        let samples = self
            .samples
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(channels as usize))
            .collect();
        Track {
            channels,
            sample_rate: self.sample_rate,
            samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixSummary {
    pub path: PathBuf,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: u64,
}

pub struct AudioMixer;

impl AudioMixer {
    /// Overlay `second` onto `first` starting at frame 0.
    ///
    /// Samples are added with saturation. The result is as long as the longer
    /// track; the shorter one contributes silence past its end. This keeps the
    /// tail of a longer second track, where a pydub-style `overlay` would cut
    /// the result to the length of `first`.
    pub fn overlay(first: &Track, second: &Track) -> Result<Track, MixError> {
        if first.sample_rate != second.sample_rate {
            return Err(MixError::SampleRateMismatch {
                first: first.sample_rate,
                second: second.sample_rate,
            });
        }

        let (first, second) = match (first.channels, second.channels) {
            (a, b) if a == b => (first.clone(), second.clone()),
            (1, 2) => (first.upmix(2), second.clone()),
            (2, 1) => (first.clone(), second.upmix(2)),
            (a, b) => return Err(MixError::ChannelMismatch { first: a, second: b }),
        };

        let len = first.samples.len().max(second.samples.len());
        let samples = (0..len)
            .map(|i| {
                let a = first.samples.get(i).copied().unwrap_or(0);
                let b = second.samples.get(i).copied().unwrap_or(0);
                a.saturating_add(b)
            })
            .collect();

        Ok(Track {
            channels: first.channels,
            sample_rate: first.sample_rate,
            samples,
        })
    }

    /// Decode a WAV file into 16-bit samples.
    pub fn read_track(path: &Path) -> Result<Track, MixError> {
        let open_err = |source| MixError::Open {
            path: path.to_path_buf(),
            source,
        };

        let reader = WavReader::open(path).map_err(open_err)?;
        let spec = reader.spec();

        let samples: Result<Vec<i16>, hound::Error> = match spec.sample_format {
            SampleFormat::Int if spec.bits_per_sample == 16 => {
                reader.into_samples::<i16>().collect()
            }
            SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| pcm::int_to_i16(v, bits)))
                    .collect()
            }
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(pcm::sample_to_i16))
                .collect(),
        };

        let track = Track {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            samples: samples.map_err(open_err)?,
        };
        debug!(
            "Decoded {:?}: {} frames, {} ch, {} Hz",
            path,
            track.frames(),
            track.channels,
            track.sample_rate
        );
        Ok(track)
    }

    /// Encode a track as a 16-bit PCM WAV file.
    pub fn write_track(path: &Path, track: &Track) -> Result<(), MixError> {
        let spec = WavSpec {
            channels: track.channels,
            sample_rate: track.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let write_err = |source| MixError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = WavWriter::create(path, spec).map_err(|source| MixError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        for &sample in &track.samples {
            writer.write_sample(sample).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)?;
        Ok(())
    }

    /// Mix two finished recordings into `output`.
    pub fn mix(first: &Path, second: &Path, output: &Path) -> Result<MixSummary, MixError> {
        let a = Self::read_track(first)?;
        let b = Self::read_track(second)?;
        let mixed = Self::overlay(&a, &b)?;
        Self::write_track(output, &mixed)?;

        info!(
            "Mixed {:?} + {:?} into {:?} ({} frames)",
            first,
            second,
            output,
            mixed.frames()
        );
        Ok(MixSummary {
            path: output.to_path_buf(),
            channels: mixed.channels,
            sample_rate: mixed.sample_rate,
            frames: mixed.frames() as u64,
        })
    }
}

/// Path of the mixed file for a session: the last `_1.` in the first track's
/// file name becomes `.`, so `20240101_120000_1.wav` mixes into
/// `20240101_120000.wav`.
pub fn mixed_path_for(first_track: &Path) -> PathBuf {
    let name = first_track
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mixed_name = match name.rfind("_1.") {
        Some(pos) => format!("{}.{}", &name[..pos], &name[pos + 3..]),
        None => {
            let stem = first_track
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{stem}_mix.wav")
        }
    };
    first_track.with_file_name(mixed_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn track(channels: u16, samples: Vec<i16>) -> Track {
        Track {
            channels,
            sample_rate: 44100,
            samples,
        }
    }

    #[test]
    fn test_overlay_adds_samples() {
        let a = track(1, vec![100, -200, 300]);
        let b = track(1, vec![1, 2, 3]);
        let mixed = AudioMixer::overlay(&a, &b).unwrap();
        assert_eq!(mixed.samples, vec![101, -198, 303]);
    }

    #[test]
    fn test_overlay_saturates() {
        let a = track(1, vec![30000, -30000]);
        let b = track(1, vec![10000, -10000]);
        let mixed = AudioMixer::overlay(&a, &b).unwrap();
        assert_eq!(mixed.samples, vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_overlay_longer_tail_passes_through() {
        let a = track(2, vec![1, 1, 2, 2, 3, 3, 4, 4]);
        let b = track(2, vec![10, 10]);
        let mixed = AudioMixer::overlay(&a, &b).unwrap();
        assert_eq!(mixed.frames(), 4);
        assert_eq!(mixed.samples[..2], [11, 11]);
        assert_eq!(mixed.samples[2..], a.samples[2..]);

        // Order of arguments does not change length.
        let swapped = AudioMixer::overlay(&b, &a).unwrap();
        assert_eq!(swapped.samples, mixed.samples);
    }

    #[test]
    fn test_overlay_upmixes_mono() {
        let mono = track(1, vec![5, 6]);
        let stereo = track(2, vec![1, 2, 3, 4]);
        let mixed = AudioMixer::overlay(&mono, &stereo).unwrap();
        assert_eq!(mixed.channels, 2);
        assert_eq!(mixed.samples, vec![6, 7, 9, 10]);
    }

    #[test]
    fn test_overlay_rejects_mismatches() {
        let a = track(1, vec![0]);
        let mut b = track(1, vec![0]);
        b.sample_rate = 48000;
        assert!(matches!(
            AudioMixer::overlay(&a, &b),
            Err(MixError::SampleRateMismatch { first: 44100, second: 48000 })
        ));

        let c = track(4, vec![0; 4]);
        assert!(matches!(
            AudioMixer::overlay(&c, &track(2, vec![0, 0])),
            Err(MixError::ChannelMismatch { first: 4, second: 2 })
        ));
    }

    #[test]
    fn test_mix_silence_stays_silent() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("s_1.wav");
        let b = dir.path().join("s_2.wav");
        let out = dir.path().join("s.wav");
        AudioMixer::write_track(&a, &track(1, vec![0; 4410])).unwrap();
        AudioMixer::write_track(&b, &track(1, vec![0; 4410])).unwrap();

        let summary = AudioMixer::mix(&a, &b, &out).unwrap();
        let mixed = AudioMixer::read_track(&out).unwrap();

        assert_eq!(summary.frames, 4410);
        assert_eq!(mixed.frames(), 4410);
        assert_eq!(mixed.sample_rate, 44100);
        assert!(mixed.samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mix_keeps_first_tail() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("l_1.wav");
        let b = dir.path().join("l_2.wav");
        let out = dir.path().join("l.wav");
        let long: Vec<i16> = (0..1000).map(|i| (i % 200) as i16 * 10).collect();
        let short: Vec<i16> = vec![7; 300];
        AudioMixer::write_track(&a, &track(1, long.clone())).unwrap();
        AudioMixer::write_track(&b, &track(1, short)).unwrap();

        AudioMixer::mix(&a, &b, &out).unwrap();
        let mixed = AudioMixer::read_track(&out).unwrap();

        assert_eq!(mixed.frames(), 1000);
        assert_eq!(mixed.samples[300..], long[300..]);
        assert_eq!(mixed.samples[0], long[0] + 7);
    }

    #[test]
    fn test_mix_reads_float_input() {
        let dir = TempDir::new().unwrap();
        let float_path = dir.path().join("f.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&float_path, spec).unwrap();
        for s in [0.5f32, -0.5, 1.0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = AudioMixer::read_track(&float_path).unwrap();
        assert_eq!(decoded.samples, vec![16383, -16383, 32767]);
    }

    #[test]
    fn test_mix_missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("present.wav");
        AudioMixer::write_track(&a, &track(1, vec![1, 2])).unwrap();

        let err = AudioMixer::mix(&a, &dir.path().join("absent.wav"), &dir.path().join("o.wav"))
            .unwrap_err();
        assert!(matches!(err, MixError::Open { .. }));
        assert!(!dir.path().join("o.wav").exists());
    }

    #[test]
    fn test_mix_corrupt_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("junk.wav");
        std::fs::write(&a, b"definitely not a wav file").unwrap();

        let err = AudioMixer::mix(&a, &a, &dir.path().join("o.wav")).unwrap_err();
        assert!(matches!(err, MixError::Open { .. }));
    }

    #[test]
    fn test_mix_unwritable_output_is_reported() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.wav");
        AudioMixer::write_track(&a, &track(1, vec![1, 2])).unwrap();

        let out = dir.path().join("no_such_dir").join("o.wav");
        let err = AudioMixer::mix(&a, &a, &out).unwrap_err();
        assert!(matches!(err, MixError::Create { .. }));
    }

    #[test]
    fn test_mixed_path_for() {
        assert_eq!(
            mixed_path_for(Path::new("/rec/20240101_120000_1.wav")),
            PathBuf::from("/rec/20240101_120000.wav")
        );
        // Only the file name is rewritten, never the directory.
        assert_eq!(
            mixed_path_for(Path::new("/take_1.d/20240101_120000-2_1.wav")),
            PathBuf::from("/take_1.d/20240101_120000-2.wav")
        );
        assert_eq!(
            mixed_path_for(Path::new("/rec/take.wav")),
            PathBuf::from("/rec/take_mix.wav")
        );
    }
}
