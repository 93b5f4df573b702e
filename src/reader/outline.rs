use crate::formats::HeadingEntry;
use crate::headings::{self, Slugger};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub section: usize,
    pub heading: HeadingEntry,
}

/// Level-2 headings of one chapter, slugged in a single chapter-wide scope and
/// tagged with the section they live in.
#[derive(Debug, Clone, Default)]
pub struct ChapterOutline {
    entries: Vec<OutlineEntry>,
}

impl ChapterOutline {
    pub fn build(sections: &[String]) -> Self {
        let mut slugger = Slugger::new();
        let entries = sections
            .iter()
            .enumerate()
            .flat_map(|(section, text)| {
                headings::index_with(text, &mut slugger)
                    .into_iter()
                    .map(move |heading| OutlineEntry { section, heading })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn headings(&self) -> Vec<HeadingEntry> {
        self.entries.iter().map(|e| e.heading.clone()).collect()
    }

    pub fn in_section(&self, section: usize) -> impl Iterator<Item = &HeadingEntry> {
        self.entries
            .iter()
            .filter(move |e| e.section == section)
            .map(|e| &e.heading)
    }

    pub fn section_of(&self, anchor: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.heading.id == anchor)
            .map(|e| e.section)
    }

    /// Slugger state right before `section` is rendered, so rendered ids match the outline.
    pub fn slugger_before(&self, section: usize) -> Slugger {
        let mut slugger = Slugger::new();
        for entry in self.entries.iter().filter(|e| e.section < section) {
            slugger.slug(&entry.heading.title);
        }
        slugger
    }
}
