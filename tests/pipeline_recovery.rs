//! End-to-end pipeline tests with stubbed collaborators: a failed run must
//! persist a recoverable recording, and resuming it must clean everything
//! up once the collaborator recovers.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use meetscribe::meeting::MeetingInfo;
use meetscribe::pipeline::{
    PipelineState, ProcessingJob, ProcessingPipeline, StatusHandle,
};
use meetscribe::recovery::RecoveryStore;
use meetscribe::retry::RetryPolicy;
use meetscribe::services::{DocumentStore, NoteFormatter, TranscriptionBackend};

struct StubTranscriber {
    calls: AtomicU32,
}

impl StubTranscriber {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TranscriptionBackend for StubTranscriber {
    async fn transcribe(&self, _wav_path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Speaker 1: hello".to_string())
    }
}

struct StubFormatter {
    calls: AtomicU32,
    fail_first: u32,
}

impl StubFormatter {
    fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_first: times,
        })
    }
}

#[async_trait]
impl NoteFormatter for StubFormatter {
    async fn format_notes(
        &self,
        transcript: &str,
        _info: &MeetingInfo,
        transcript_filename: &str,
    ) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            return Err(anyhow!("formatting service unavailable"));
        }
        Ok(format!(
            "## Notes\n\n{transcript}\n\n### Raw Transcript\n[[{transcript_filename}]]\n"
        ))
    }
}

/// Records the status step label visible at the moment transcription runs.
struct StepRecordingTranscriber {
    status: StatusHandle,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TranscriptionBackend for StepRecordingTranscriber {
    async fn transcribe(&self, _wav_path: &Path) -> Result<String> {
        self.seen.lock().unwrap().push(self.status.get().step);
        Ok("Speaker 1: hello".to_string())
    }
}

struct BrokenDocStore;

#[async_trait]
impl DocumentStore for BrokenDocStore {
    async fn upload_notes(&self, _path: &Path, _title: &str, _folder: &str) -> Result<String> {
        Err(anyhow!("document store unreachable"))
    }
}

struct Dirs {
    _root: tempfile::TempDir,
    transcript_dir: PathBuf,
    notes_dir: PathBuf,
    recovery_dir: PathBuf,
    wav_path: PathBuf,
}

fn setup() -> Dirs {
    let root = tempfile::tempdir().unwrap();
    let transcript_dir = root.path().join("transcripts");
    let notes_dir = root.path().join("notes");
    let recovery_dir = root.path().join("saved-recordings");
    let wav_path = root.path().join("2024-01-02_10-00-00_Team_Sync_-_Q3.wav");
    std::fs::write(&wav_path, b"RIFFfake-wav-bytes").unwrap();
    Dirs {
        _root: root,
        transcript_dir,
        notes_dir,
        recovery_dir,
        wav_path,
    }
}

fn build_pipeline(
    dirs: &Dirs,
    transcriber: Arc<dyn TranscriptionBackend>,
    formatter: Arc<dyn NoteFormatter>,
    docstore: Option<Arc<dyn DocumentStore>>,
    api_key_configured: bool,
) -> (Arc<ProcessingPipeline>, StatusHandle) {
    let status = StatusHandle::default();
    // Zero base delay keeps the backoff path exercised without real sleeps.
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::ZERO,
    };
    let pipeline = ProcessingPipeline::new(
        transcriber,
        formatter,
        docstore,
        RecoveryStore::new(dirs.recovery_dir.clone()),
        status.clone(),
        retry,
        api_key_configured,
        Some(dirs.transcript_dir.clone()),
        Some(dirs.notes_dir.clone()),
        "notes".to_string(),
    );
    (Arc::new(pipeline), status)
}

fn job(dirs: &Dirs) -> ProcessingJob {
    ProcessingJob::new(
        dirs.wav_path.clone(),
        MeetingInfo::with_title("Team Sync / Q3"),
        "2024-01-02_10-00-00".to_string(),
    )
}

#[tokio::test]
async fn exhausted_formatting_saves_recording_for_retry() {
    let dirs = setup();
    let transcriber = StubTranscriber::new();
    let formatter = StubFormatter::failing(u32::MAX);
    let (pipeline, status) =
        build_pipeline(&dirs, transcriber.clone(), formatter.clone(), None, true);

    pipeline.run(job(&dirs)).await;

    // Every formatting attempt was consumed.
    assert_eq!(formatter.calls.load(Ordering::SeqCst), 3);
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);

    // Transcript made it to disk before the failure.
    assert!(dirs
        .transcript_dir
        .join("2024-01-02_10-00-00_Team_Sync_-_Q3_transcript.md")
        .exists());

    // The recording is recoverable: sidecar + waveform pair exists.
    let store = RecoveryStore::new(dirs.recovery_dir.clone());
    let records = store.list().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, "2024-01-02_10-00-00_Team_Sync_-_Q3");
    assert_eq!(record.retry_count, 3);
    assert_eq!(record.title, "Team Sync / Q3");
    assert!(store.wav_path(&record.id).exists());
    assert!(!dirs.wav_path.exists(), "waveform should have been moved");

    // The failure is reported only through the status surface.
    let outcome = status.get();
    assert_eq!(outcome.state, PipelineState::Idle);
    let error = outcome.error.expect("status error set");
    assert!(error.contains("formatting service unavailable"), "{error}");
    assert!(error.ends_with("audio saved for retry."), "{error}");
}

#[tokio::test]
async fn resume_deletes_pair_and_writes_notes() {
    let dirs = setup();

    // First run: exhaust retries.
    let (pipeline, _) = build_pipeline(
        &dirs,
        StubTranscriber::new(),
        StubFormatter::failing(u32::MAX),
        None,
        true,
    );
    pipeline.run(job(&dirs)).await;

    let store = RecoveryStore::new(dirs.recovery_dir.clone());
    let record = store.load("2024-01-02_10-00-00_Team_Sync_-_Q3").unwrap();

    // Resume with a formatter that now succeeds.
    let (pipeline, status) = build_pipeline(
        &dirs,
        StubTranscriber::new(),
        StubFormatter::failing(0),
        None,
        true,
    );
    pipeline.run(ProcessingJob::from_saved(&store, &record)).await;

    let notes_path = dirs
        .notes_dir
        .join("2024-01-02_10-00-00_Team_Sync_-_Q3_notes.md");
    assert!(notes_path.exists());
    let notes = std::fs::read_to_string(&notes_path).unwrap();
    assert!(notes.contains("[[2024-01-02_10-00-00_Team_Sync_-_Q3_transcript.md]]"));

    // Both halves of the recovery pair are gone.
    assert!(!store.wav_path(&record.id).exists());
    assert!(!store.sidecar_path(&record.id).exists());
    assert!(store.list().unwrap().is_empty());

    let outcome = status.get();
    assert_eq!(outcome.state, PipelineState::Idle);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.step, "Done!");
}

#[tokio::test]
async fn resumed_runs_announce_retrying_instead_of_uploading() {
    let dirs = setup();
    let status = StatusHandle::default();
    let transcriber = Arc::new(StepRecordingTranscriber {
        status: status.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let pipeline = ProcessingPipeline::new(
        transcriber.clone(),
        StubFormatter::failing(0),
        None,
        RecoveryStore::new(dirs.recovery_dir.clone()),
        status.clone(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
        true,
        Some(dirs.transcript_dir.clone()),
        Some(dirs.notes_dir.clone()),
        "notes".to_string(),
    );

    // Fresh job first.
    pipeline.run(job(&dirs)).await;

    // Then a resumed job via the recovery store.
    let store = RecoveryStore::new(dirs.recovery_dir.clone());
    let wav = dirs._root.path().join("again.wav");
    std::fs::write(&wav, b"RIFFfake").unwrap();
    let id = store
        .save(
            &wav,
            &MeetingInfo::with_title("Again"),
            "2024-01-05_10-00-00",
            "e",
            3,
        )
        .unwrap();
    let record = store.load(&id).unwrap();
    pipeline.run(ProcessingJob::from_saved(&store, &record)).await;

    let seen = transcriber.seen.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        ["Uploading audio to Gemini...", "Retrying transcription..."]
    );
}

#[tokio::test]
async fn docstore_failure_never_blocks_success() {
    let dirs = setup();
    let (pipeline, status) = build_pipeline(
        &dirs,
        StubTranscriber::new(),
        StubFormatter::failing(0),
        Some(Arc::new(BrokenDocStore)),
        true,
    );

    pipeline.run(job(&dirs)).await;

    let outcome = status.get();
    assert!(outcome.error.is_none());
    assert_eq!(outcome.step, "Done!");
    assert!(!dirs.wav_path.exists(), "waveform deleted on success");
    assert!(dirs
        .notes_dir
        .join("2024-01-02_10-00-00_Team_Sync_-_Q3_notes.md")
        .exists());
}

#[tokio::test]
async fn missing_api_key_fails_without_retries_but_still_saves() {
    let dirs = setup();
    let transcriber = StubTranscriber::new();
    let formatter = StubFormatter::failing(0);
    let (pipeline, status) =
        build_pipeline(&dirs, transcriber.clone(), formatter.clone(), None, false);

    pipeline.run(job(&dirs)).await;

    // Configuration errors never reach the collaborators.
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    assert_eq!(formatter.calls.load(Ordering::SeqCst), 0);

    let error = status.get().error.expect("status error set");
    assert!(error.contains("Gemini API key not configured"), "{error}");

    // The capture is still preserved for after the user fixes settings.
    let store = RecoveryStore::new(dirs.recovery_dir.clone());
    assert_eq!(store.list().unwrap().len(), 1);
}
