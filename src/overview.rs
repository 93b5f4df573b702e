use crate::formats::{Chapter, ProgressData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ChapterStatus {
    pub fn marker(self) -> &'static str {
        match self {
            ChapterStatus::NotStarted => " ",
            ChapterStatus::InProgress => "~",
            ChapterStatus::Completed => "x",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewEntry {
    pub chapter_id: String,
    pub title: String,
    pub status: ChapterStatus,
    pub is_last_active: bool,
}

/// Home page summary: every chapter with its reading status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingOverview {
    pub entries: Vec<OverviewEntry>,
    pub completed_count: usize,
    pub percent: u32,
    pub resume: Option<String>,
}

impl ReadingOverview {
    pub fn build(chapters: &[Chapter], progress: &ProgressData) -> Self {
        let entries: Vec<OverviewEntry> = chapters
            .iter()
            .map(|chapter| {
                let status = match progress.chapter(&chapter.id) {
                    Some(p) if p.completed => ChapterStatus::Completed,
                    Some(p) if p.visited => ChapterStatus::InProgress,
                    _ => ChapterStatus::NotStarted,
                };
                OverviewEntry {
                    chapter_id: chapter.id.clone(),
                    title: chapter.title.clone(),
                    status,
                    is_last_active: chapter.id == progress.last_chapter,
                }
            })
            .collect();

        let completed_count = entries
            .iter()
            .filter(|e| e.status == ChapterStatus::Completed)
            .count();
        let percent = if entries.is_empty() {
            0
        } else {
            ((completed_count as f64 / entries.len() as f64) * 100.0).round() as u32
        };
        let resume = entries
            .iter()
            .find(|e| e.is_last_active)
            .map(|e| e.chapter_id.clone());

        Self {
            entries,
            completed_count,
            percent,
            resume,
        }
    }
}
