//! External collaborator contracts.
//!
//! The pipeline only ever talks to these traits; the concrete Gemini and
//! Drive implementations live alongside them. Tests substitute stubs.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::meeting::MeetingInfo;

mod gemini;

pub mod docstore;
pub mod formatter;
pub mod transcriber;

pub use docstore::DriveStore;
pub use formatter::GeminiFormatter;
pub use transcriber::GeminiTranscriber;

/// Turns a waveform file into a speaker-labeled plain-text transcript.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, wav_path: &Path) -> Result<String>;
}

/// Turns a transcript plus meeting metadata into structured Markdown notes.
#[async_trait]
pub trait NoteFormatter: Send + Sync {
    async fn format_notes(
        &self,
        transcript: &str,
        info: &MeetingInfo,
        transcript_filename: &str,
    ) -> Result<String>;
}

/// Publishes a notes file to a remote document store. Best-effort only:
/// the pipeline logs failures and moves on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns a viewable-document reference.
    async fn upload_notes(&self, notes_path: &Path, title: &str, folder: &str) -> Result<String>;
}
