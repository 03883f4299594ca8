//! Service wiring: config → collaborators → session → pipeline.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::global;
use crate::meeting::MeetingInfo;
use crate::pipeline::{ProcessingJob, ProcessingPipeline, StatusHandle};
use crate::recording::{RecordingSession, TIMESTAMP_FORMAT};
use crate::recovery::RecoveryStore;

/// Record until Ctrl+C, then stop, mix and process.
///
/// The pipeline itself is fire-and-forget; since this is a one-shot CLI
/// process we await its completion before exiting so the work is not torn
/// down with the process.
pub async fn run_record(title: Option<String>) -> Result<()> {
    let config = Config::load()?;

    let meeting_info = match title {
        Some(title) => MeetingInfo::with_title(title),
        None => MeetingInfo::default(),
    };

    let status = StatusHandle::default();
    let pipeline = Arc::new(ProcessingPipeline::from_config(&config, status.clone())?);

    let recordings_dir = match &config.output.recordings_dir {
        Some(dir) => dir.clone(),
        None => global::recordings_dir()?,
    };

    let mut session = RecordingSession::new(recordings_dir)?;
    session.start(&meeting_info.title)?;
    status.set_recording();

    info!("Recording '{}', press Ctrl+C to stop", meeting_info.title);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!(
        "Stopping after {}s, mixing audio...",
        session.elapsed_seconds()
    );

    let wav_path = session.stop()?;
    session.cleanup();

    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    let job = ProcessingJob::new(wav_path, meeting_info, timestamp);

    let handle = pipeline.spawn(job);
    handle.await.context("Processing task panicked")?;

    report_outcome(&status);
    Ok(())
}

/// Re-enter the pipeline for a recording saved after failed processing.
pub async fn run_saved_retry(id: &str) -> Result<()> {
    let config = Config::load()?;

    let store = RecoveryStore::open_default()?;
    let record = store.load(id)?;

    info!(
        "Retrying saved recording '{}' ({}, {} earlier attempts)",
        record.title, record.id, record.retry_count
    );

    let status = StatusHandle::default();
    let pipeline = Arc::new(ProcessingPipeline::from_config(&config, status.clone())?);

    let job = ProcessingJob::from_saved(&store, &record);
    let handle = pipeline.spawn(job);
    handle.await.context("Processing task panicked")?;

    report_outcome(&status);
    Ok(())
}

fn report_outcome(status: &StatusHandle) {
    let outcome = status.get();
    match outcome.error {
        Some(error) => warn!("Processing did not complete: {}", error),
        None => info!("Processing complete"),
    }
}
