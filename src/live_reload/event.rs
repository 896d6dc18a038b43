//! Change events and the messages pushed to live-reload subscribers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

impl ChangeKind {
    /// Reason string carried by the reload message.
    pub fn reason(self) -> &'static str {
        match self {
            ChangeKind::Added => "file-added",
            ChangeKind::Changed => "file-changed",
            ChangeKind::Removed => "file-removed",
        }
    }

    /// Combine the kind already pending for a path with a newer one.
    ///
    /// The result describes the net effect across the whole burst: a file
    /// created and then written is still `Added`, a file that existed and
    /// was deleted is `Removed`, and one deleted then recreated is `Changed`.
    pub fn merge(self, newer: ChangeKind) -> ChangeKind {
        use ChangeKind::*;
        match (self, newer) {
            (Added, Changed) => Added,
            (Removed, Added) | (Removed, Changed) => Changed,
            (_, newer) => newer,
        }
    }
}

/// A stabilised filesystem change, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// The message subscribers receive for this change.
    pub fn to_reload(&self) -> ReloadEvent {
        ReloadEvent::Reload {
            reason: self.kind.reason().to_string(),
            file: self.path.to_string_lossy().replace('\\', "/"),
        }
    }
}

/// A message on the live-reload channel.
///
/// ```json
/// {"type": "connected"}
/// {"type": "reload", "reason": "file-changed", "file": "slides/foo/metadata.json"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadEvent {
    Connected,
    Reload { reason: String, file: String },
}

impl ReloadEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// One server-sent-events frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", self.to_json()?))
    }
}

impl From<&ChangeEvent> for ReloadEvent {
    fn from(change: &ChangeEvent) -> Self {
        change.to_reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChangeKind::*;

    #[test]
    fn reasons() {
        assert_eq!(Added.reason(), "file-added");
        assert_eq!(Changed.reason(), "file-changed");
        assert_eq!(Removed.reason(), "file-removed");
    }

    #[test]
    fn merge_keeps_net_effect() {
        assert_eq!(Added.merge(Changed), Added);
        assert_eq!(Changed.merge(Changed), Changed);
        assert_eq!(Changed.merge(Removed), Removed);
        assert_eq!(Added.merge(Removed), Removed);
        assert_eq!(Removed.merge(Added), Changed);
    }

    #[test]
    fn wire_format() {
        let frame = ReloadEvent::Connected.to_sse_frame().unwrap();
        assert_eq!(frame, "data: {\"type\":\"connected\"}\n\n");

        let reload = ChangeEvent::new(Changed, "slides/foo/metadata.json").to_reload();
        let value: serde_json::Value = serde_json::from_str(&reload.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "reload",
                "reason": "file-changed",
                "file": "slides/foo/metadata.json"
            })
        );
        let parsed: ReloadEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, reload);
    }
}
