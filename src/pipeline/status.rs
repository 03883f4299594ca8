//! Processing status types and shared state handle.
//!
//! One process-wide status value, written by the session and pipeline and
//! polled by observers. Writes are last-writer-wins; a reader may see a
//! slightly stale step label, which is fine for advisory progress.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Recording,
    Processing,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Processing => "processing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingStatus {
    pub state: PipelineState,
    /// Human-readable progress label for the currently executing stage.
    pub step: String,
    pub error: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            step: String::new(),
            error: None,
            started_at: None,
        }
    }
}

impl ProcessingStatus {
    /// Seconds since recording started; 0 outside the recording state.
    pub fn elapsed_seconds(&self) -> u64 {
        if self.state != PipelineState::Recording {
            return 0;
        }
        self.started_at
            .map(|started| (chrono::Utc::now() - started).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Thread-safe handle shared between the session, the pipeline and
/// observers. A plain mutex suffices: every write is a short lock-and-set
/// and writers never hold the lock across an await point.
#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<ProcessingStatus>>,
}

impl StatusHandle {
    pub fn get(&self) -> ProcessingStatus {
        self.inner.lock().unwrap().clone()
    }

    pub fn set_recording(&self) {
        let mut status = self.inner.lock().unwrap();
        status.state = PipelineState::Recording;
        status.step = String::new();
        status.error = None;
        status.started_at = Some(chrono::Utc::now());
    }

    pub fn set_processing(&self, step: &str) {
        let mut status = self.inner.lock().unwrap();
        status.state = PipelineState::Processing;
        status.step = step.to_string();
        status.error = None;
        status.started_at = None;
    }

    pub fn set_step(&self, step: &str) {
        let mut status = self.inner.lock().unwrap();
        status.step = step.to_string();
    }

    pub fn set_done(&self) {
        let mut status = self.inner.lock().unwrap();
        status.state = PipelineState::Idle;
        status.step = "Done!".to_string();
        status.error = None;
        status.started_at = None;
    }

    pub fn set_error(&self, error: String) {
        let mut status = self.inner.lock().unwrap();
        status.state = PipelineState::Idle;
        status.step = String::new();
        status.error = Some(error);
        status.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_as_str() {
        assert_eq!(PipelineState::Idle.as_str(), "idle");
        assert_eq!(PipelineState::Recording.as_str(), "recording");
        assert_eq!(PipelineState::Processing.as_str(), "processing");
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&PipelineState::Processing).unwrap(),
            "\"processing\""
        );
        let parsed: PipelineState = serde_json::from_str("\"recording\"").unwrap();
        assert_eq!(parsed, PipelineState::Recording);
    }

    #[test]
    fn test_elapsed_zero_outside_recording() {
        let status = ProcessingStatus::default();
        assert_eq!(status.elapsed_seconds(), 0);
    }

    #[test]
    fn test_handle_lifecycle() {
        let handle = StatusHandle::default();

        handle.set_recording();
        let status = handle.get();
        assert_eq!(status.state, PipelineState::Recording);
        assert!(status.started_at.is_some());
        assert!(status.error.is_none());

        handle.set_processing("Uploading audio to Gemini...");
        let status = handle.get();
        assert_eq!(status.state, PipelineState::Processing);
        assert_eq!(status.step, "Uploading audio to Gemini...");
        assert_eq!(status.elapsed_seconds(), 0);

        handle.set_step("Saving transcript...");
        assert_eq!(handle.get().step, "Saving transcript...");

        handle.set_done();
        let status = handle.get();
        assert_eq!(status.state, PipelineState::Idle);
        assert_eq!(status.step, "Done!");
    }

    #[test]
    fn test_handle_error() {
        let handle = StatusHandle::default();
        handle.set_error("boom — audio saved for retry.".to_string());

        let status = handle.get();
        assert_eq!(status.state, PipelineState::Idle);
        assert_eq!(
            status.error.as_deref(),
            Some("boom — audio saved for retry.")
        );
    }
}
