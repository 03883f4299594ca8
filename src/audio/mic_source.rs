//! Microphone capture via cpal.
//!
//! The cpal stream runs on its own audio thread and appends fixed-format
//! chunks into a buffer owned by this source; nothing else touches the
//! buffer until `stop()` takes it.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use super::audio_source::{AudioSource, SAMPLE_RATE};

pub struct MicSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
    stream: Option<cpal::Stream>,
    active: bool,
}

impl MicSource {
    /// Create a mic source on the default input device at the fixed
    /// capture format (mono i16, 44.1 kHz).
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available for mic capture")?;

        info!(
            "Mic source using device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            config,
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            active: false,
        })
    }

    /// List available input devices, for the `devices` CLI command.
    pub fn available_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.input_devices().context("Failed to enumerate input devices")? {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

impl AudioSource for MicSource {
    fn start(&mut self) -> Result<()> {
        if self.active {
            return Err(anyhow::anyhow!("Mic source already recording"));
        }

        {
            let mut samples = self.samples.lock().unwrap();
            samples.clear();
            samples.shrink_to_fit();
        }

        let samples_clone = self.samples.clone();
        // Overflow is tolerated: dropped samples are logged, never fatal.
        let err_fn = |err| error!("Mic stream error (samples dropped): {}", err);

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut samples) = samples_clone.lock() {
                    samples.extend_from_slice(data);
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;
        self.stream = Some(stream);
        self.active = true;

        info!("Mic recording started");
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<i16>> {
        if !self.active {
            return Err(anyhow::anyhow!("Mic source not recording"));
        }

        if let Some(stream) = self.stream.take() {
            debug!("Stopping mic stream");
            drop(stream);
        }

        self.active = false;

        let samples = {
            let mut guard = self.samples.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        info!("Mic stopped, {} samples captured", samples.len());
        Ok(samples)
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active MicSource, cleaning up");
            let _ = self.stop();
        }
    }
}
