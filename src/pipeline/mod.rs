//! Background processing pipeline.
//!
//! Turns a captured waveform plus meeting metadata into persisted
//! transcript and notes files, with best-effort Drive publication. The
//! two network-bound stages (transcription, formatting) run under the
//! retry policy; once retries are exhausted the waveform and metadata are
//! persisted to the recovery store instead of being lost, and the failure
//! is reported only through the status surface.

pub mod status;

pub use status::{PipelineState, ProcessingStatus, StatusHandle};

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::meeting::{sanitize_title, MeetingInfo};
use crate::recovery::{RecoveryStore, SavedRecording};
use crate::retry::RetryPolicy;
use crate::services::{
    DocumentStore, DriveStore, GeminiFormatter, GeminiTranscriber, NoteFormatter,
    TranscriptionBackend,
};

/// Caller misconfiguration. Fatal to the run, never retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Gemini API key not configured. Go to Settings to add it.")]
    MissingApiKey,
    #[error("Transcript/Notes directories not configured. Go to Settings.")]
    MissingDirectories,
}

/// One unit of work for the pipeline: a waveform plus the metadata
/// captured alongside it. `recovery_sidecar` is set when this job resumes
/// a previously saved recording, so success can delete the pair.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub wav_path: PathBuf,
    pub meeting_info: MeetingInfo,
    pub timestamp: String,
    pub recovery_sidecar: Option<PathBuf>,
}

impl ProcessingJob {
    pub fn new(wav_path: PathBuf, meeting_info: MeetingInfo, timestamp: String) -> Self {
        Self {
            wav_path,
            meeting_info,
            timestamp,
            recovery_sidecar: None,
        }
    }

    /// Re-entry point for a saved recording: same pipeline, stored
    /// metadata and timestamp, sidecar attached for cleanup on success.
    pub fn from_saved(store: &RecoveryStore, record: &SavedRecording) -> Self {
        Self {
            wav_path: store.stored_wav_path(record),
            meeting_info: record.meeting_info.clone(),
            timestamp: record.timestamp.clone(),
            recovery_sidecar: Some(store.sidecar_path(&record.id)),
        }
    }
}

pub struct ProcessingPipeline {
    transcriber: Arc<dyn TranscriptionBackend>,
    formatter: Arc<dyn NoteFormatter>,
    docstore: Option<Arc<dyn DocumentStore>>,
    recovery: RecoveryStore,
    status: StatusHandle,
    retry: RetryPolicy,
    api_key_configured: bool,
    transcript_dir: Option<PathBuf>,
    notes_dir: Option<PathBuf>,
    drive_folder: String,
}

impl ProcessingPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transcriber: Arc<dyn TranscriptionBackend>,
        formatter: Arc<dyn NoteFormatter>,
        docstore: Option<Arc<dyn DocumentStore>>,
        recovery: RecoveryStore,
        status: StatusHandle,
        retry: RetryPolicy,
        api_key_configured: bool,
        transcript_dir: Option<PathBuf>,
        notes_dir: Option<PathBuf>,
        drive_folder: String,
    ) -> Self {
        Self {
            transcriber,
            formatter,
            docstore,
            recovery,
            status,
            retry,
            api_key_configured,
            transcript_dir,
            notes_dir,
            drive_folder,
        }
    }

    /// Wire up the real Gemini and Drive collaborators from config.
    pub fn from_config(config: &Config, status: StatusHandle) -> Result<Self> {
        let api_key = config.gemini.api_key.clone().unwrap_or_default();
        let model = config.gemini.model_or_default().to_string();

        let docstore: Option<Arc<dyn DocumentStore>> = config
            .drive
            .access_token
            .clone()
            .map(|token| Arc::new(DriveStore::new(token)) as Arc<dyn DocumentStore>);

        Ok(Self::new(
            Arc::new(GeminiTranscriber::new(api_key.clone(), model.clone())),
            Arc::new(GeminiFormatter::new(api_key.clone(), model)),
            docstore,
            RecoveryStore::open_default()?,
            status,
            RetryPolicy::from(config.retry),
            !api_key.is_empty(),
            config.output.transcript_dir.clone(),
            config.output.notes_dir.clone(),
            config.drive.folder_name.clone(),
        ))
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn recovery(&self) -> &RecoveryStore {
        &self.recovery
    }

    /// Fire-and-forget execution off the caller's path: the stop operation
    /// returns immediately while processing continues in the background.
    pub fn spawn(self: Arc<Self>, job: ProcessingJob) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(job).await })
    }

    /// Run the pipeline to completion. Never propagates stage errors: on
    /// failure the recording is persisted for later retry and the error is
    /// surfaced through the status handle.
    pub async fn run(&self, job: ProcessingJob) {
        let initial_step = if job.recovery_sidecar.is_some() {
            "Retrying transcription..."
        } else {
            "Uploading audio to Gemini..."
        };
        self.status.set_processing(initial_step);

        match self.run_stages(&job).await {
            Ok(()) => {
                self.status.set_done();
            }
            Err(e) => {
                let error_msg = format!("{e:#}");
                error!("Processing failed after retries: {}", error_msg);

                if let Err(save_err) = self.recovery.save(
                    &job.wav_path,
                    &job.meeting_info,
                    &job.timestamp,
                    &error_msg,
                    self.retry.max_attempts,
                ) {
                    error!("Failed to save recording for retry: {:#}", save_err);
                }

                self.status
                    .set_error(format!("{error_msg} — audio saved for retry."));
            }
        }
    }

    async fn run_stages(&self, job: &ProcessingJob) -> Result<()> {
        // Configuration problems are caller mistakes, not transient
        // failures: fail immediately, before any retry loop.
        if !self.api_key_configured {
            return Err(ConfigError::MissingApiKey.into());
        }
        let (transcript_dir, notes_dir) = match (&self.transcript_dir, &self.notes_dir) {
            (Some(t), Some(n)) => (t.clone(), n.clone()),
            _ => return Err(ConfigError::MissingDirectories.into()),
        };

        let title = job.meeting_info.title.clone();
        let safe_title = sanitize_title(&title);

        // 1. Transcribe, with retries
        let transcript = self
            .retry
            .run(
                "Transcription",
                || self.transcriber.transcribe(&job.wav_path),
                |msg| self.status.set_step(msg),
            )
            .await?;

        // 2. Persist transcript
        self.status.set_step("Saving transcript...");
        let transcript_filename = format!("{}_{}_transcript.md", job.timestamp, safe_title);
        std::fs::create_dir_all(&transcript_dir)?;
        let transcript_path = transcript_dir.join(&transcript_filename);
        std::fs::write(
            &transcript_path,
            transcript_file_content(&title, &job.timestamp, &transcript),
        )?;
        info!("Transcript saved: {:?}", transcript_path);

        // 3. Format notes, with retries
        self.status.set_step("Generating structured notes...");
        let notes = self
            .retry
            .run(
                "Note formatting",
                || {
                    self.formatter
                        .format_notes(&transcript, &job.meeting_info, &transcript_filename)
                },
                |msg| self.status.set_step(msg),
            )
            .await?;

        // 4. Persist notes
        self.status.set_step("Saving notes...");
        let notes_filename = format!("{}_{}_notes.md", job.timestamp, safe_title);
        std::fs::create_dir_all(&notes_dir)?;
        let notes_path = notes_dir.join(&notes_filename);
        std::fs::write(&notes_path, &notes)?;
        info!("Notes saved: {:?}", notes_path);

        // 5. Remote upload, best-effort: failures log and move on
        if let Some(docstore) = &self.docstore {
            self.status.set_step("Uploading to Google Drive...");
            let doc_title = format!("{} - {}", title, job.timestamp);
            match docstore
                .upload_notes(&notes_path, &doc_title, &self.drive_folder)
                .await
            {
                Ok(link) => info!("Notes published: {}", link),
                Err(e) => warn!("Drive upload failed (non-fatal): {:#}", e),
            }
        }

        // 6. Success: the waveform (and recovery pair, if resumed) is no
        // longer needed.
        if let Err(e) = std::fs::remove_file(&job.wav_path) {
            warn!("Failed to delete waveform {:?}: {}", job.wav_path, e);
        }
        if let Some(sidecar) = &job.recovery_sidecar {
            if let Err(e) = std::fs::remove_file(sidecar) {
                warn!("Failed to delete recovery sidecar {:?}: {}", sidecar, e);
            }
        }

        Ok(())
    }
}

/// Transcript markdown with a small header prepended.
fn transcript_file_content(title: &str, timestamp: &str, transcript: &str) -> String {
    format!(
        "# Transcript: {title}\n**Date**: {timestamp}\n\n---\n\n{transcript}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_file_content_header() {
        let content = transcript_file_content("Standup", "2024-01-02_10-00-00", "hello");
        assert!(content.starts_with("# Transcript: Standup\n"));
        assert!(content.contains("**Date**: 2024-01-02_10-00-00"));
        assert!(content.contains("\n---\n"));
        assert!(content.ends_with("hello"));
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::MissingApiKey.to_string(),
            "Gemini API key not configured. Go to Settings to add it."
        );
        assert_eq!(
            ConfigError::MissingDirectories.to_string(),
            "Transcript/Notes directories not configured. Go to Settings."
        );
    }
}
