//! Gemini-backed note formatting: transcript + meeting metadata in, a fixed
//! six-section Markdown document out.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::gemini::GeminiClient;
use super::NoteFormatter;
use crate::meeting::MeetingInfo;

pub struct GeminiFormatter {
    client: GeminiClient,
}

impl GeminiFormatter {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: GeminiClient::new(api_key, model, None),
        }
    }

    fn build_prompt(info: &MeetingInfo, transcript: &str, transcript_filename: &str) -> String {
        let title = if info.title.is_empty() {
            "Untitled Meeting"
        } else {
            &info.title
        };
        let date = if info.start.is_empty() {
            "Unknown"
        } else {
            &info.start
        };
        let description = if info.description.is_empty() {
            "N/A"
        } else {
            &info.description
        };

        format!(
            "You are a meeting note assistant. Given the following meeting transcript \
and metadata, create structured meeting notes in Markdown format.\n\
\n\
**Meeting Title**: {title}\n\
**Date**: {date}\n\
**Attendees**: {attendees}\n\
**Meeting Description**: {description}\n\
\n\
Format the notes with these exact sections:\n\
\n\
## {title}\n\
\n\
**Date**: (formatted date)\n\
**Attendees**: (comma-separated list)\n\
\n\
### Meeting Purpose\n\
(1-2 sentences summarizing why this meeting was held)\n\
\n\
### Key Discussion Points\n\
(Bulleted list of main topics discussed, with sub-bullets for details)\n\
\n\
### Challenges & Concerns\n\
(Bulleted list of problems, blockers, or concerns raised)\n\
\n\
### Goals & Decisions\n\
(Bulleted list of decisions made or goals agreed upon)\n\
\n\
### Next Steps\n\
(Bulleted list of action items, with the responsible person if identifiable)\n\
\n\
### Raw Transcript\n\
[[{transcript_filename}]]\n\
\n\
---\n\
\n\
Here is the transcript:\n\
\n\
{transcript}\n",
            title = title,
            date = date,
            attendees = info.attendees_display(),
            description = description,
            transcript_filename = transcript_filename,
            transcript = transcript,
        )
    }
}

#[async_trait]
impl NoteFormatter for GeminiFormatter {
    async fn format_notes(
        &self,
        transcript: &str,
        info: &MeetingInfo,
        transcript_filename: &str,
    ) -> Result<String> {
        let prompt = Self::build_prompt(info, transcript, transcript_filename);
        let notes = self.client.generate(&prompt, None).await?;
        info!("Notes generated: {} chars", notes.len());
        Ok(notes)
    }
}
