//! Best-effort Google Drive publication of the notes file.
//!
//! Uploads the notes markdown converted to a Google Doc inside a named
//! folder. Token acquisition and refresh happen outside this application;
//! we only consume a ready access token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

use super::DocumentStore;

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD: &str = "https://www.googleapis.com/upload/drive/v3";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(rename = "webViewLink", default)]
    web_view_link: Option<String>,
}

pub struct DriveStore {
    client: reqwest::Client,
    access_token: String,
}

impl DriveStore {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    /// Find a folder by name, creating it when missing. Returns its id.
    async fn ensure_folder(&self, name: &str) -> Result<String> {
        let query = format!(
            "name = '{}' and mimeType = 'application/vnd.google-apps.folder' and trashed = false",
            name.replace('\'', "\\'")
        );

        let response = self
            .client
            .get(format!("{}/files", DRIVE_API))
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await
            .context("Failed to list Drive folders")?
            .error_for_status()
            .context("Drive folder lookup failed")?;

        let list: FileList = response
            .json()
            .await
            .context("Failed to parse Drive folder list")?;

        if let Some(folder) = list.files.into_iter().next() {
            debug!("Using existing Drive folder '{}' ({})", name, folder.id);
            return Ok(folder.id);
        }

        let created: DriveFile = self
            .client
            .post(format!("{}/files", DRIVE_API))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "name": name,
                "mimeType": "application/vnd.google-apps.folder",
            }))
            .send()
            .await
            .context("Failed to create Drive folder")?
            .error_for_status()
            .context("Drive folder creation failed")?
            .json()
            .await
            .context("Failed to parse Drive folder creation response")?;

        info!("Created Drive folder '{}' ({})", name, created.id);
        Ok(created.id)
    }
}

#[async_trait]
impl DocumentStore for DriveStore {
    async fn upload_notes(&self, notes_path: &Path, title: &str, folder: &str) -> Result<String> {
        let folder_id = self.ensure_folder(folder).await?;

        let content = tokio::fs::read_to_string(notes_path)
            .await
            .context("Failed to read notes file")?;

        // Multipart upload converting the markdown to a Google Doc.
        let metadata = json!({
            "name": title,
            "mimeType": "application/vnd.google-apps.document",
            "parents": [folder_id],
        });

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::text(content).mime_str("text/markdown")?,
            );

        let uploaded: DriveFile = self
            .client
            .post(format!("{}/files?uploadType=multipart", DRIVE_UPLOAD))
            .query(&[("fields", "id,webViewLink")])
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload notes to Drive")?
            .error_for_status()
            .context("Drive upload failed")?
            .json()
            .await
            .context("Failed to parse Drive upload response")?;

        let link = uploaded
            .web_view_link
            .unwrap_or_else(|| format!("drive:{}", uploaded.id));

        info!("Notes uploaded to Drive: {}", link);
        Ok(link)
    }
}
