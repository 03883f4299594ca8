pub mod audio_mixer;
pub mod audio_source;
pub mod mic_source;
pub mod system_source;

pub use audio_mixer::AudioMixer;
pub use audio_source::{AudioSource, CHUNK_SAMPLES, SAMPLE_RATE};
pub use mic_source::MicSource;
pub use system_source::{find_helper_binary, SystemSource};
