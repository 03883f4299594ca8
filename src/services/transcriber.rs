//! Gemini-backed transcription: upload the waveform, wait for the file to
//! become active, then request a speaker-labeled transcript.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::gemini::GeminiClient;
use super::TranscriptionBackend;

const TRANSCRIBE_PROMPT: &str = "Transcribe this audio recording of a meeting. \
Include speaker labels where you can distinguish different speakers \
(e.g., Speaker 1, Speaker 2). \
Include timestamps approximately every few minutes. \
Output the transcript as plain text, preserving the natural flow of conversation.";

pub struct GeminiTranscriber {
    client: GeminiClient,
}

impl GeminiTranscriber {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: GeminiClient::new(api_key, model, None),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for GeminiTranscriber {
    async fn transcribe(&self, wav_path: &Path) -> Result<String> {
        info!("Transcribing audio file via Gemini: {:?}", wav_path);

        let file = self.client.upload_file(wav_path).await?;
        self.client.wait_until_active(&file).await?;
        let transcript = self.client.generate(TRANSCRIBE_PROMPT, Some(&file)).await?;

        info!("Transcription complete: {} chars", transcript.len());
        Ok(transcript.trim().to_string())
    }
}
