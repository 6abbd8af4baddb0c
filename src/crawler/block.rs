//! Block Detector
//!
//! Recognizes pages served by anti-bot defenses instead of real content.
//! Detection is best-effort: markers are matched case-insensitively as whole
//! words, so `403` flags "403 Forbidden" but not a 4030 postcode, and the
//! lists are kept short to avoid flagging genuine listings.

use crate::config::BlockConfig;

/// Outcome of inspecting a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVerdict {
    pub blocked: bool,

    /// What triggered a positive verdict
    pub reason: Option<String>,
}

impl BlockVerdict {
    pub fn clear() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockDetector {
    title_markers: Vec<String>,
    body_markers: Vec<String>,
    blocked_statuses: Vec<u16>,
}

impl BlockDetector {
    pub fn new(title_markers: &[String], body_markers: &[String], blocked_statuses: &[u16]) -> Self {
        Self {
            title_markers: lowercase_markers(title_markers),
            body_markers: lowercase_markers(body_markers),
            blocked_statuses: blocked_statuses.to_vec(),
        }
    }

    pub fn from_config(config: &BlockConfig) -> Self {
        Self::new(
            &config.title_markers,
            &config.body_markers,
            &config.blocked_statuses,
        )
    }

    /// Checks status, then title, then visible body text
    pub fn inspect(&self, title: Option<&str>, body: &str, status: Option<u16>) -> BlockVerdict {
        if let Some(status) = status {
            if self.blocked_statuses.contains(&status) {
                return BlockVerdict::blocked(format!("HTTP status {}", status));
            }
        }

        if let Some(title) = title {
            let title = title.to_lowercase();
            if let Some(marker) = self.title_markers.iter().find(|m| contains_word(&title, m.as_str())) {
                return BlockVerdict::blocked(format!("title matched '{}'", marker));
            }
        }

        let body = body.to_lowercase();
        if let Some(marker) = self.body_markers.iter().find(|m| contains_word(&body, m.as_str())) {
            return BlockVerdict::blocked(format!("body matched '{}'", marker));
        }

        BlockVerdict::clear()
    }
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::from_config(&BlockConfig::default())
    }
}

/// Whether `marker` occurs in `text` with no letter or digit directly on either side
fn contains_word(text: &str, marker: &str) -> bool {
    text.match_indices(marker).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + marker.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn lowercase_markers(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect()
}
