//! System audio capture via the `audiotee` helper process.
//!
//! The helper taps whatever the system is playing and streams raw PCM
//! (mono i16 LE at the requested sample rate) on stdout. A reader thread
//! pulls fixed-size chunks into this source's buffer; a second thread
//! drains stderr so the helper can never stall on a full pipe.
//!
//! If the helper binary cannot be located the source is simply absent and
//! recording proceeds mic-only and that is not an error.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::audio_source::{AudioSource, CHUNK_SAMPLES, SAMPLE_RATE};

const HELPER_NAME: &str = "audiotee";
const TERMINATE_WAIT: Duration = Duration::from_secs(5);
const READER_JOIN_WAIT: Duration = Duration::from_secs(5);
const DRAIN_JOIN_WAIT: Duration = Duration::from_secs(2);

/// Locate the capture helper binary.
///
/// Search order: next to our own executable under `bin/`, the app data
/// directory's `bin/`, then the system search path.
pub fn find_helper_binary() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let local = dir.join("bin").join(HELPER_NAME);
            if local.is_file() {
                return Some(local);
            }
        }
    }

    if let Ok(data_dir) = crate::global::data_dir() {
        let bundled = data_dir.join("bin").join(HELPER_NAME);
        if bundled.is_file() {
            return Some(bundled);
        }
    }

    which::which(HELPER_NAME).ok()
}

pub struct SystemSource {
    helper: PathBuf,
    child: Option<Child>,
    bytes: Arc<Mutex<Vec<u8>>>,
    stderr_lines: Arc<Mutex<Vec<String>>>,
    stop_flag: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    drain_thread: Option<JoinHandle<()>>,
    active: bool,
}

impl SystemSource {
    /// Build a system source if the helper binary can be found.
    pub fn locate() -> Option<Self> {
        match find_helper_binary() {
            Some(helper) => {
                info!("System audio helper found: {:?}", helper);
                Some(Self::new(helper))
            }
            None => {
                warn!(
                    "{} binary not found, recording mic only (no system audio)",
                    HELPER_NAME
                );
                None
            }
        }
    }

    pub fn new(helper: PathBuf) -> Self {
        Self {
            helper,
            child: None,
            bytes: Arc::new(Mutex::new(Vec::new())),
            stderr_lines: Arc::new(Mutex::new(Vec::new())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            reader_thread: None,
            drain_thread: None,
            active: false,
        }
    }

    /// Terminate the helper: SIGTERM, bounded wait, then SIGKILL.
    fn terminate_helper(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }

        let deadline = Instant::now() + TERMINATE_WAIT;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Helper process exited: {}", status);
                    return;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("Helper did not exit after SIGTERM, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        return;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    warn!("Failed to wait for helper process: {}", e);
                    let _ = child.kill();
                    return;
                }
            }
        }
    }
}

/// Join a capture thread without risking an unbounded hang. A thread that
/// outlives the timeout is abandoned and logged, not waited for.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, name: &'static str) {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = handle.join();
        let _ = tx.send(());
    });
    if rx.recv_timeout(timeout).is_err() {
        warn!("{} thread did not exit within {:?}", name, timeout);
    }
}

impl AudioSource for SystemSource {
    fn start(&mut self) -> Result<()> {
        if self.active {
            return Err(anyhow::anyhow!("System source already recording"));
        }

        {
            let mut bytes = self.bytes.lock().unwrap();
            bytes.clear();
            bytes.shrink_to_fit();
        }
        self.stderr_lines.lock().unwrap().clear();
        self.stop_flag.store(false, Ordering::SeqCst);

        info!("Launching system audio helper: {:?}", self.helper);
        let mut child = Command::new(&self.helper)
            .arg("--sample-rate")
            .arg(SAMPLE_RATE.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn system audio helper")?;

        let mut stdout = child
            .stdout
            .take()
            .context("Helper stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("Helper stderr was not captured")?;

        // PCM reader: fixed-size chunks matching the mic capture config
        // (16-bit mono, so CHUNK_SAMPLES * 2 bytes per read).
        let bytes = self.bytes.clone();
        let stop_flag = self.stop_flag.clone();
        let reader = std::thread::spawn(move || {
            let mut buf = vec![0u8; CHUNK_SAMPLES * 2];
            while !stop_flag.load(Ordering::SeqCst) {
                match stdout.read(&mut buf) {
                    Ok(0) => {
                        let collected = bytes.lock().map(|b| b.len()).unwrap_or(0);
                        info!(
                            "Helper stdout closed ({} bytes collected so far)",
                            collected
                        );
                        break;
                    }
                    Ok(n) => {
                        if let Ok(mut bytes) = bytes.lock() {
                            bytes.extend_from_slice(&buf[..n]);
                        }
                    }
                    Err(e) => {
                        warn!("Error reading helper stdout: {}", e);
                        break;
                    }
                }
            }
        });

        // Always-running drain so the helper's stderr buffer cannot fill
        // and stall the process.
        let stderr_lines = self.stderr_lines.clone();
        let drain = std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => {
                        if let Ok(mut lines) = stderr_lines.lock() {
                            lines.push(line);
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        self.child = Some(child);
        self.reader_thread = Some(reader);
        self.drain_thread = Some(drain);
        self.active = true;

        info!("System audio capture started");
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<i16>> {
        if !self.active {
            return Err(anyhow::anyhow!("System source not recording"));
        }

        self.stop_flag.store(true, Ordering::SeqCst);
        self.terminate_helper();

        if let Some(handle) = self.reader_thread.take() {
            join_with_timeout(handle, READER_JOIN_WAIT, "helper reader");
        }
        if let Some(handle) = self.drain_thread.take() {
            join_with_timeout(handle, DRAIN_JOIN_WAIT, "helper stderr drain");
        }

        self.active = false;

        let raw = {
            let mut guard = self.bytes.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        {
            let lines = self.stderr_lines.lock().unwrap();
            for line in lines.iter().rev().take(5).rev() {
                debug!("[{}] {}", HELPER_NAME, line);
            }
        }

        let samples: Vec<i16> = raw
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        info!("System audio stopped, {} samples captured", samples.len());
        Ok(samples)
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SystemSource {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active SystemSource, cleaning up");
            let _ = self.stop();
        }
    }
}
