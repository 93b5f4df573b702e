use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};

use regex::Regex;

use crate::formats::Chapter;

/// Marker token that follows the chapter number in a chapter heading.
pub const CHAPTER_MARKER: &str = "장";

static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^# ?(\d+){CHAPTER_MARKER}\.? ?(.*)$"))
        .expect("valid chapter heading regex")
});

/// Splits a document into chapters at every `# <n>장. <title>` line.
///
/// Text before the first chapter heading belongs to no chapter.
pub fn parse(source: &str) -> Vec<Chapter> {
    let matches = CHAPTER_RE.captures_iter(source).collect::<Vec<_>>();
    let mut chapters = Vec::with_capacity(matches.len());

    for (idx, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(number), Some(text)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let start = whole.start();
        let end = matches
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(source.len(), |next| next.start());

        let mut heading_end = whole.end();
        if source[heading_end..].starts_with('\n') {
            heading_end += 1;
        }
        let heading_end = heading_end.min(end);

        let text = text.as_str().trim();
        let title = if text.is_empty() {
            format!("{}{CHAPTER_MARKER}.", number.as_str())
        } else {
            format!("{}{CHAPTER_MARKER}. {text}", number.as_str())
        };

        chapters.push(Chapter {
            id: idx.to_string(),
            title,
            body: source[heading_end..end].to_owned(),
            heading_line: source[start..heading_end].to_owned(),
            source_span: start..end,
        });
    }

    if let Some(first) = chapters.first()
        && !source[..first.source_span.start].trim().is_empty()
    {
        tracing::debug!(
            bytes = first.source_span.start,
            "ignoring text before the first chapter heading"
        );
    }
    tracing::debug!(chapters = chapters.len(), "parsed content");
    chapters
}

/// Ids of the chapters around one chapter, as seen by next/prev navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterNeighbors {
    pub previous: Option<String>,
    pub next: Option<String>,
    pub earlier: Vec<String>,
}

/// Parse-once cache over the textbook source.
///
/// A missing document yields zero chapters and is retried on the next call;
/// the first successful parse is kept for the life of the cache.
#[derive(Debug)]
pub struct ChapterCache {
    path: PathBuf,
    chapters: OnceLock<Arc<[Chapter]>>,
}

impl ChapterCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chapters: OnceLock::new(),
        }
    }

    /// Cache that is already populated from an in-memory document.
    pub fn from_source(source: &str) -> Self {
        let cache = Self::new(PathBuf::new());
        let _ = cache.chapters.set(parse(source).into());
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chapters(&self) -> Arc<[Chapter]> {
        if let Some(chapters) = self.chapters.get() {
            return Arc::clone(chapters);
        }

        let source = match std::fs::read_to_string(&self.path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "content file unavailable");
                return Arc::from(Vec::new());
            }
        };

        let parsed: Arc<[Chapter]> = parse(&source).into();
        tracing::info!(
            path = %self.path.display(),
            chapters = parsed.len(),
            "loaded content"
        );
        Arc::clone(self.chapters.get_or_init(|| parsed))
    }

    pub fn chapter(&self, id: &str) -> Option<Chapter> {
        self.chapters().iter().find(|c| c.id == id).cloned()
    }

    /// Adjacent chapter ids. `max_chapter` caps how far `next` may reach.
    pub fn neighbors(&self, id: &str, max_chapter: Option<usize>) -> ChapterNeighbors {
        let chapters = self.chapters();
        let Some(pos) = chapters.iter().position(|c| c.id == id) else {
            return ChapterNeighbors::default();
        };

        let previous = pos
            .checked_sub(1)
            .and_then(|prev| chapters.get(prev))
            .map(|c| c.id.clone());
        let next = chapters
            .get(pos + 1)
            .filter(|c| {
                max_chapter.is_none_or(|max| c.index().is_some_and(|index| index <= max))
            })
            .map(|c| c.id.clone());
        let earlier = chapters[..pos].iter().map(|c| c.id.clone()).collect();

        ChapterNeighbors {
            previous,
            next,
            earlier,
        }
    }
}
