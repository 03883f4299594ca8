//! Shared plumbing for the Gemini API: file upload, readiness polling and
//! content generation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    state: Option<FileState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum FileState {
    Processing,
    Active,
    Failed,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: endpoint.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
        }
    }

    /// Upload an audio file to the Gemini Files API and return its handle.
    pub async fn upload_file(&self, path: &Path) -> Result<FileInfo> {
        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.base_url, self.api_key
        );

        debug!("Uploading audio file to Gemini: {:?}", path);

        let audio_data = tokio::fs::read(path)
            .await
            .context("Failed to read audio file")?;

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", "audio/wav")
            .body(audio_data)
            .send()
            .await
            .context("Failed to upload audio to Gemini")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read upload response body")?;

        if !status.is_success() {
            error!("Gemini upload failed with status {}: {}", status, body);
            return Err(anyhow::anyhow!(
                "Gemini upload failed with status {}: {}",
                status,
                body
            ));
        }

        let upload: UploadResponse =
            serde_json::from_str(&body).context("Failed to parse upload response")?;

        debug!("Audio uploaded: {}", upload.file.uri);
        Ok(upload.file)
    }

    /// Poll an uploaded file until it leaves the PROCESSING state. Exceeding
    /// the poll bound is a timeout failure.
    pub async fn wait_until_active(&self, file: &FileInfo) -> Result<()> {
        if file.state == Some(FileState::Active) {
            return Ok(());
        }

        let url = format!("{}/v1beta/{}?key={}", self.base_url, file.name, self.api_key);

        for attempt in 1..=MAX_POLL_ATTEMPTS {
            debug!(
                "Polling file state (attempt {}/{}): {}",
                attempt, MAX_POLL_ATTEMPTS, file.name
            );

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .context("Failed to poll file state")?;

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read poll response body")?;

            if !status.is_success() {
                return Err(anyhow::anyhow!(
                    "Gemini file poll failed with status {}: {}",
                    status,
                    body
                ));
            }

            let polled: FileInfo =
                serde_json::from_str(&body).context("Failed to parse poll response")?;

            match polled.state {
                Some(FileState::Active) => {
                    info!("Uploaded file is active: {}", file.name);
                    return Ok(());
                }
                Some(FileState::Failed) => {
                    return Err(anyhow::anyhow!("Gemini file processing failed"));
                }
                Some(FileState::Processing) | None => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        Err(anyhow::anyhow!(
            "Gemini file processing timed out after {} attempts",
            MAX_POLL_ATTEMPTS
        ))
    }

    /// Generate content from a text prompt, optionally with an uploaded file
    /// attached.
    pub async fn generate(&self, prompt: &str, file: Option<&FileInfo>) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mut parts = vec![json!({ "text": prompt })];
        if let Some(file) = file {
            parts.push(json!({
                "file_data": { "mime_type": "audio/wav", "file_uri": file.uri }
            }));
        }
        let body = json!({ "contents": [{ "parts": parts }] });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to call Gemini generateContent")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read generateContent response body")?;

        if !status.is_success() {
            error!(
                "Gemini generateContent failed with status {}: {}",
                status, body
            );
            return Err(anyhow::anyhow!(
                "Gemini generateContent failed with status {}: {}",
                status,
                body
            ));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generateContent response")?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(anyhow::anyhow!("Gemini returned an empty response"));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_response() {
        let body = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "hello " }, { "text": "world" } ] } }
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_parse_upload_response_states() {
        let body = r#"{
            "file": { "name": "files/abc", "uri": "https://x/files/abc", "state": "PROCESSING" }
        }"#;
        let parsed: UploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.file.state, Some(FileState::Processing));
        assert_eq!(parsed.file.name, "files/abc");
    }
}
