pub mod deep_link;
pub mod layout;
pub mod navigation;
pub mod outline;
pub mod session;
pub mod tracker;

use crate::config::CompletionPolicy;
use crate::content::{ChapterCache, ChapterNeighbors};
use crate::formats::Chapter;

/// Everything a chapter page needs to know about its place in the book.
#[derive(Debug, Clone)]
pub struct ChapterContext {
    pub chapter: Chapter,
    pub neighbors: ChapterNeighbors,
    pub policy: CompletionPolicy,
}

impl ChapterContext {
    pub fn from_cache(
        cache: &ChapterCache,
        chapter_id: &str,
        max_chapter: Option<usize>,
        policy: CompletionPolicy,
    ) -> Option<Self> {
        let chapter = cache.chapter(chapter_id)?;
        let neighbors = cache.neighbors(chapter_id, max_chapter);
        Some(Self {
            chapter,
            neighbors,
            policy,
        })
    }
}
