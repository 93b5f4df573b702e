use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Storage key of the persisted progress record.
pub const PROGRESS_STORAGE_KEY: &str = "c_tutoring_progress_v1";

/// Schema version written alongside the progress record.
pub const PROGRESS_SCHEMA_VERSION: u32 = 1;

/// Chapter every fresh progress record points at.
pub const INITIAL_CHAPTER_ID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Zero-based position in the source document, as a decimal string.
    pub id: String,
    /// Canonical `"<num>장. <text>"` title.
    pub title: String,
    /// Markdown following the heading line, up to the next chapter heading.
    pub body: String,
    /// The chapter heading line as it appeared in the source, terminator included.
    pub heading_line: String,
    /// Byte range of `heading_line + body` within the source document.
    pub source_span: Range<usize>,
}

impl Chapter {
    pub fn index(&self) -> Option<usize> {
        self.id.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingEntry {
    pub id: String,
    pub title: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterProgress {
    pub visited: bool,
    pub completed: bool,
    pub scroll_ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_section_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_anchor: Option<String>,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Default for ChapterProgress {
    fn default() -> Self {
        Self {
            visited: false,
            completed: false,
            scroll_ratio: 0.0,
            current_section_index: None,
            last_anchor: None,
            updated_at: 0,
        }
    }
}

/// Partial update merged onto a [`ChapterProgress`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPatch {
    pub completed: Option<bool>,
    pub scroll_ratio: Option<f64>,
    pub current_section_index: Option<usize>,
    pub last_anchor: Option<String>,
}

impl ProgressPatch {
    pub fn section(index: usize) -> Self {
        Self {
            current_section_index: Some(index),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_completed(mut self) -> Self {
        self.completed = Some(true);
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.last_anchor = Some(anchor.into());
        self
    }

    /// Field-by-field merge. Completion only changes when the patch states it.
    pub fn apply(&self, existing: &ChapterProgress, now_ms: i64) -> ChapterProgress {
        ChapterProgress {
            visited: true,
            completed: self.completed.unwrap_or(existing.completed),
            scroll_ratio: self
                .scroll_ratio
                .filter(|ratio| ratio.is_finite())
                .map_or(existing.scroll_ratio, |ratio| ratio.clamp(0.0, 1.0)),
            current_section_index: self
                .current_section_index
                .or(existing.current_section_index),
            last_anchor: self
                .last_anchor
                .clone()
                .or_else(|| existing.last_anchor.clone()),
            updated_at: now_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    pub last_chapter: String,
    #[serde(default)]
    pub chapters: BTreeMap<String, ChapterProgress>,
}

impl Default for ProgressData {
    fn default() -> Self {
        Self {
            last_chapter: INITIAL_CHAPTER_ID.to_owned(),
            chapters: BTreeMap::new(),
        }
    }
}

impl ProgressData {
    pub fn chapter(&self, chapter_id: &str) -> Option<&ChapterProgress> {
        self.chapters.get(chapter_id)
    }

    /// Stored section index for `chapter_id`, only when it was the last active chapter.
    pub fn resumable_section(&self, chapter_id: &str) -> Option<usize> {
        if self.last_chapter != chapter_id {
            return None;
        }
        self.chapter(chapter_id)?.current_section_index
    }
}

/// On-disk envelope carrying the schema version next to the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProgress {
    pub version: u32,
    #[serde(flatten)]
    pub data: ProgressData,
}
