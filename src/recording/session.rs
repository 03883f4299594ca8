//! Recording session lifecycle: owns the capture sources and the mixer.
//!
//! One session per recording; state only moves forward
//! (Idle → Recording → Stopped). The capture buffers are owned by their
//! source threads while recording and handed over only after both sources
//! have stopped, so mixing never races a writer.

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use hound::{WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audio::{AudioMixer, AudioSource, MicSource, SystemSource, SAMPLE_RATE};
use crate::meeting::sanitize_title;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
}

pub struct RecordingSession {
    output_dir: PathBuf,
    mic: Box<dyn AudioSource>,
    system: Option<Box<dyn AudioSource>>,
    output_path: Option<PathBuf>,
    start_time: Option<chrono::DateTime<Local>>,
    state: SessionState,
}

impl RecordingSession {
    /// Create a session with the real capture sources: the default mic,
    /// and the helper-backed system source when the helper binary exists.
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        let mic = Box::new(MicSource::new()?);
        let system: Option<Box<dyn AudioSource>> = match SystemSource::locate() {
            Some(s) => Some(Box::new(s)),
            None => None,
        };
        Ok(Self::with_sources(mic, system, output_dir))
    }

    pub fn with_sources(
        mic: Box<dyn AudioSource>,
        system: Option<Box<dyn AudioSource>>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            output_dir,
            mic,
            system,
            output_path: None,
            start_time: None,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Start capturing. The mic source always runs; the system source runs
    /// only when present, and a system-source start failure degrades to
    /// mic-only rather than aborting.
    pub fn start(&mut self, meeting_title: &str) -> Result<PathBuf> {
        if self.state != SessionState::Idle {
            bail!("Recording session already used (state: {:?})", self.state);
        }

        std::fs::create_dir_all(&self.output_dir)?;

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let output_path = self.output_dir.join(output_filename(meeting_title, &timestamp));

        self.mic.start()?;

        if let Some(system) = self.system.as_mut() {
            if let Err(e) = system.start() {
                warn!("Failed to start system audio: {}. Recording mic only.", e);
                self.system = None;
            }
        }

        self.start_time = Some(Local::now());
        self.state = SessionState::Recording;
        self.output_path = Some(output_path.clone());

        info!("Recording started: {:?}", output_path);
        Ok(output_path)
    }

    /// Stop capturing, mix the streams and write the WAV file.
    ///
    /// Capture-side failures are degraded, not propagated: a source that
    /// fails to stop contributes no samples, and the session still writes
    /// a best-effort output file.
    pub fn stop(&mut self) -> Result<PathBuf> {
        if self.state != SessionState::Recording {
            bail!("Not currently recording (state: {:?})", self.state);
        }

        let mic_samples = match self.mic.stop() {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to stop mic: {}", e);
                Vec::new()
            }
        };

        let system_samples = match self.system.as_mut().map(|s| s.stop()) {
            Some(Ok(s)) => Some(s),
            Some(Err(e)) => {
                warn!("Failed to stop system audio: {}", e);
                None
            }
            None => None,
        };

        info!(
            "Recording stopped: mic={} samples (peak {}), system={} samples (peak {})",
            mic_samples.len(),
            AudioMixer::peak(&mic_samples),
            system_samples.as_deref().map(|s| s.len()).unwrap_or(0),
            system_samples
                .as_deref()
                .map(AudioMixer::peak)
                .unwrap_or(0),
        );

        let mixed = AudioMixer::mix(&mic_samples, system_samples.as_deref());

        info!(
            "Final WAV: {:.1}s, {} samples",
            mixed.len() as f64 / SAMPLE_RATE as f64,
            mixed.len()
        );

        let output_path = self
            .output_path
            .clone()
            .ok_or_else(|| anyhow!("No output path recorded"))?;
        write_wav(&output_path, &mixed)?;

        self.state = SessionState::Stopped;
        Ok(output_path)
    }

    /// Seconds since recording started; 0 when not recording.
    pub fn elapsed_seconds(&self) -> u64 {
        if self.state != SessionState::Recording {
            return 0;
        }
        self.start_time
            .map(|started| (Local::now() - started).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Release the capture device handles.
    pub fn cleanup(self) {
        // Sources release their device/process handles on drop.
    }
}

/// Deterministic waveform filename for a title at a timestamp.
pub fn output_filename(meeting_title: &str, timestamp: &str) -> String {
    format!("{}_{}.wav", timestamp, sanitize_title(meeting_title))
}

/// Serialize mixed samples to a standard WAV container
/// (mono, 16-bit signed LE, 44.1 kHz).
pub fn write_wav(path: &Path, samples: &[i16]) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
