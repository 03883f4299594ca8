//! Meeting metadata attached to a recording.
//!
//! Supplied by the caller when recording starts (typically from a calendar
//! event) and carried unchanged through processing and recovery.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub organizer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingInfo {
    pub title: String,
    pub start: String,
    pub end: String,
    pub attendees: Vec<Attendee>,
    pub description: String,
    pub meeting_link: String,
}

impl Default for MeetingInfo {
    fn default() -> Self {
        Self {
            title: "untitled".to_string(),
            start: String::new(),
            end: String::new(),
            attendees: Vec::new(),
            description: String::new(),
            meeting_link: String::new(),
        }
    }
}

impl MeetingInfo {
    /// Placeholder info for an ad-hoc recording with just a title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Comma-separated attendee names, or "Unknown" when empty.
    pub fn attendees_display(&self) -> String {
        if self.attendees.is_empty() {
            return "Unknown".to_string();
        }
        self.attendees
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Make a title safe for use in a filename: spaces become underscores,
/// path separators become hyphens.
pub fn sanitize_title(title: &str) -> String {
    title.replace(' ', "_").replace(['/', '\\'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Team Sync / Q3"), "Team_Sync_-_Q3");
        assert_eq!(sanitize_title("plain"), "plain");
        assert_eq!(sanitize_title("a\\b"), "a-b");
    }

    #[test]
    fn test_attendees_display() {
        let mut info = MeetingInfo::with_title("Standup");
        assert_eq!(info.attendees_display(), "Unknown");

        info.attendees.push(Attendee {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            organizer: true,
        });
        info.attendees.push(Attendee {
            name: "Ben".to_string(),
            email: "ben@example.com".to_string(),
            organizer: false,
        });
        assert_eq!(info.attendees_display(), "Ana, Ben");
    }

    #[test]
    fn test_default_title_placeholder() {
        assert_eq!(MeetingInfo::default().title, "untitled");
    }
}
