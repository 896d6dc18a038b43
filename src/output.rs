//! On-disk records: per-deck metadata and the published index.
//!
//! Field names follow the JSON wire format (`camelCase`) so records written
//! by this crate are readable by the browser viewer without translation.

use crate::config::ImageFormat;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `metadata.json` inside each slide-deck directory.
///
/// ```json
/// { "name": "my-talk", "title": "My Talk", "pageCount": 12,
///   "createdAt": "2026-10-16", "sha256": "9f86d0…", "format": "webp" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideMetadata {
    /// Slug; equal to the directory name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub page_count: usize,
    /// Calendar date of the import, serialised as `YYYY-MM-DD`.
    pub created_at: NaiveDate,
    /// Hex SHA-256 of the source PDF.
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Encoding of the page images. Absent on records from older imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
    /// Keys this crate does not model (e.g. `filename` from other tools).
    /// Kept so a rewrite never drops them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlideMetadata {
    /// Display name: the title when set, else the slug.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// File name of page `page_num` (1-indexed), e.g. `page-007.webp`.
    pub fn page_file_name(&self, page_num: usize) -> String {
        page_file_name(page_num, self.format.unwrap_or_default())
    }

    /// Overlay the editable fields from `patch`.
    pub fn apply(&mut self, patch: MetadataPatch) {
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
    }
}

/// Partial update of a metadata record.
///
/// Only presentation fields are editable; `name`, `pageCount`, `sha256` and
/// `format` describe what is on disk and change only through re-import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<NaiveDate>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.created_at.is_none()
    }
}

/// `slides-index.json` at the root of a published site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideIndex {
    pub slides: Vec<SlideMetadata>,
    /// RFC 3339 timestamp of the build.
    pub updated_at: DateTime<Utc>,
}

/// `page-NNN.<ext>` for a 1-indexed page number.
pub fn page_file_name(page_num: usize, format: ImageFormat) -> String {
    format!("page-{:03}.{}", page_num, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SlideMetadata {
        SlideMetadata {
            name: "my-talk".into(),
            title: None,
            page_count: 3,
            created_at: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            sha256: "ab".repeat(32),
            description: None,
            format: Some(ImageFormat::Jpeg),
            extra: Map::new(),
        }
    }

    #[test]
    fn wire_format_is_camel_case() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["pageCount"], 3);
        assert_eq!(v["createdAt"], "2026-10-16");
        assert_eq!(v["format"], "jpeg");
        assert!(v.get("title").is_none(), "unset optionals are omitted");
    }

    #[test]
    fn reads_records_without_format() {
        let m: SlideMetadata = serde_json::from_value(json!({
            "name": "old", "pageCount": 2, "createdAt": "2025-01-31",
            "sha256": "00", "title": "Old deck"
        }))
        .unwrap();
        assert_eq!(m.format, None);
        assert_eq!(m.display_title(), "Old deck");
        assert_eq!(m.page_file_name(2), "page-002.webp");
    }

    #[test]
    fn unknown_keys_round_trip() {
        let m: SlideMetadata = serde_json::from_value(json!({
            "name": "deck", "pageCount": 1, "createdAt": "2025-01-31",
            "sha256": "00", "filename": "Deck.pdf"
        }))
        .unwrap();
        assert_eq!(m.extra.get("filename"), Some(&json!("Deck.pdf")));
        assert_eq!(serde_json::to_value(&m).unwrap()["filename"], "Deck.pdf");
    }

    #[test]
    fn page_names_are_zero_padded() {
        assert_eq!(page_file_name(1, ImageFormat::Png), "page-001.png");
        assert_eq!(page_file_name(42, ImageFormat::Jpeg), "page-042.jpg");
        assert_eq!(page_file_name(1000, ImageFormat::Webp), "page-1000.webp");
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut m = sample();
        m.apply(MetadataPatch {
            title: Some("My Talk".into()),
            ..Default::default()
        });
        assert_eq!(m.title.as_deref(), Some("My Talk"));
        assert_eq!(m.page_count, 3);
        assert_eq!(m.created_at, sample().created_at);
    }

    #[test]
    fn patch_ignores_structural_fields() {
        let patch: MetadataPatch =
            serde_json::from_value(json!({"pageCount": 99, "description": "x"})).unwrap();
        assert_eq!(patch.description.as_deref(), Some("x"));
        assert!(!patch.is_empty());
        assert!(MetadataPatch::default().is_empty());
    }
}
