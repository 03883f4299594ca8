//! Audio source abstraction for capturing audio from different inputs.

use anyhow::Result;

/// Number of samples per capture chunk.
pub const CHUNK_SAMPLES: usize = 1024;

/// Fixed capture format: mono, signed 16-bit little-endian.
pub const SAMPLE_RATE: u32 = 44_100;

/// Trait for audio capture sources (microphone, system audio tap).
///
/// Each source captures independently into its own buffer and hands the
/// samples over when stopped. Both variants produce the same fixed format
/// (mono i16 at [`SAMPLE_RATE`]), so the mixer never needs to resample.
pub trait AudioSource {
    /// Start capturing audio. Clears any previously captured samples.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and return all captured samples.
    fn stop(&mut self) -> Result<Vec<i16>>;

    /// Whether this source is currently capturing.
    fn is_active(&self) -> bool;
}
