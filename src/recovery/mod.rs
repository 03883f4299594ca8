//! Durable persistence for captured-but-not-fully-processed recordings.
//!
//! When a pipeline run exhausts its retries, the waveform is moved into a
//! dedicated recovery directory and a JSON metadata sidecar is written
//! next to it. The pair lives until a resumed run succeeds. The WAV is
//! moved before the sidecar is written, so a sidecar always references an
//! existing file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::meeting::{sanitize_title, MeetingInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecording {
    /// Record id, equal to the sidecar file stem. Not serialized; derived
    /// from the filename on load.
    #[serde(skip)]
    pub id: String,
    pub wav_filename: String,
    pub title: String,
    pub timestamp: String,
    pub meeting_info: MeetingInfo,
    pub last_error: String,
    pub retry_count: u32,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

pub struct RecoveryStore {
    dir: PathBuf,
}

impl RecoveryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::global::saved_recordings_dir()?))
    }

    pub fn wav_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.wav"))
    }

    pub fn sidecar_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Path of a loaded record's waveform, from the sidecar's own
    /// `wav_filename` field rather than re-derived from the id.
    pub fn stored_wav_path(&self, record: &SavedRecording) -> PathBuf {
        self.dir.join(&record.wav_filename)
    }

    /// Move the waveform into the recovery directory and write its metadata
    /// sidecar. Returns the record id.
    pub fn save(
        &self,
        wav_path: &Path,
        meeting_info: &MeetingInfo,
        timestamp: &str,
        last_error: &str,
        retry_count: u32,
    ) -> Result<String> {
        std::fs::create_dir_all(&self.dir).context("Failed to create recovery directory")?;

        let id = format!("{}_{}", timestamp, sanitize_title(&meeting_info.title));
        let dest_wav = self.wav_path(&id);

        // A resumed recording that fails again is already in place.
        if wav_path != dest_wav {
            move_file(wav_path, &dest_wav)?;
        }

        let record = SavedRecording {
            id: id.clone(),
            wav_filename: format!("{id}.wav"),
            title: meeting_info.title.clone(),
            timestamp: timestamp.to_string(),
            meeting_info: meeting_info.clone(),
            last_error: last_error.to_string(),
            retry_count,
            saved_at: chrono::Utc::now(),
        };

        let sidecar = self.sidecar_path(&id);
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&sidecar, json).context("Failed to write recovery sidecar")?;

        info!("Recording saved for later retry: {:?}", dest_wav);
        Ok(id)
    }

    /// Scan the recovery directory for sidecars whose waveform still
    /// exists, newest first. Malformed sidecars are skipped, not fatal.
    pub fn list(&self) -> Result<Vec<SavedRecording>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match self.read_sidecar(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping unreadable recovery sidecar {:?}: {}", path, e);
                }
            }
        }

        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    /// Load a single record by id, verifying its waveform exists.
    pub fn load(&self, id: &str) -> Result<SavedRecording> {
        let sidecar = self.sidecar_path(id);
        if !sidecar.exists() {
            bail!("Recording not found: {}", id);
        }
        self.read_sidecar(&sidecar)
    }

    fn read_sidecar(&self, path: &Path) -> Result<SavedRecording> {
        let content = std::fs::read_to_string(path)?;
        let mut record: SavedRecording = serde_json::from_str(&content)?;

        record.id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let wav = self.dir.join(&record.wav_filename);
        if !wav.exists() {
            bail!("Audio file missing: {:?}", wav);
        }

        Ok(record)
    }
}

/// Rename, falling back to copy-and-remove when the recovery directory is
/// on a different filesystem.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).with_context(|| format!("Failed to move {:?} to {:?}", from, to))?;
    std::fs::remove_file(from).context("Failed to remove source after copy")?;
    Ok(())
}
