use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::formats::ProgressPatch;
use crate::progress::ProgressStore;

/// Scroll depth past which a chapter counts as read.
pub const COMPLETION_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_top: f64,
    pub document_height: f64,
    pub viewport_height: f64,
}

impl ViewportMetrics {
    pub fn is_finite(&self) -> bool {
        self.scroll_top.is_finite()
            && self.document_height.is_finite()
            && self.viewport_height.is_finite()
    }

    /// Fraction of the scrollable distance covered; 1 when nothing scrolls.
    pub fn ratio(&self) -> f64 {
        let scrollable = self.document_height - self.viewport_height;
        if scrollable <= 0.0 {
            return 1.0;
        }
        (self.scroll_top / scrollable).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollReport {
    pub ratio: f64,
    pub completed: bool,
}

/// Rate-limited scroll sampling for one active chapter.
#[derive(Debug)]
pub struct ScrollTracker {
    chapter_id: String,
    interval: Duration,
    last_sample: Option<Instant>,
    store: Arc<ProgressStore>,
}

impl ScrollTracker {
    pub fn new(chapter_id: impl Into<String>, interval: Duration, store: Arc<ProgressStore>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            interval,
            last_sample: None,
            store,
        }
    }

    /// Records a sample unless one was taken less than `interval` ago.
    /// Samples with non-finite metrics are dropped.
    pub fn observe(&mut self, metrics: ViewportMetrics, now: Instant) -> Option<ScrollReport> {
        if !metrics.is_finite() {
            tracing::debug!(?metrics, "ignoring non-finite scroll sample");
            return None;
        }
        if let Some(last) = self.last_sample
            && now.duration_since(last) < self.interval
        {
            return None;
        }
        self.last_sample = Some(now);

        let ratio = metrics.ratio();
        let completed = ratio > COMPLETION_THRESHOLD;
        let patch = ProgressPatch {
            scroll_ratio: Some(ratio),
            completed: completed.then_some(true),
            ..ProgressPatch::default()
        };
        self.store.update(&self.chapter_id, &patch);

        Some(ScrollReport { ratio, completed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_top: f64) -> ViewportMetrics {
        ViewportMetrics {
            scroll_top,
            document_height: 3000.0,
            viewport_height: 1000.0,
        }
    }

    #[test]
    fn short_content_counts_as_fully_viewed() {
        let m = ViewportMetrics {
            scroll_top: 0.0,
            document_height: 500.0,
            viewport_height: 900.0,
        };
        assert_eq!(m.ratio(), 1.0);
    }

    #[test]
    fn samples_are_rate_limited() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut tracker = ScrollTracker::new("1", Duration::from_millis(500), Arc::clone(&store));
        let start = Instant::now();

        assert!(tracker.observe(metrics(500.0), start).is_some());
        assert!(
            tracker
                .observe(metrics(900.0), start + Duration::from_millis(100))
                .is_none()
        );
        assert_eq!(store.load().chapters["1"].scroll_ratio, 0.25);

        let report = tracker
            .observe(metrics(900.0), start + Duration::from_millis(600))
            .expect("sample");
        assert_eq!(report.ratio, 0.45);
    }

    #[test]
    fn scrolling_back_up_never_uncompletes() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut tracker = ScrollTracker::new("4", Duration::ZERO, Arc::clone(&store));
        let start = Instant::now();

        let report = tracker.observe(metrics(1900.0), start).expect("sample");
        assert!(report.completed);
        let report = tracker
            .observe(metrics(0.0), start + Duration::from_millis(1))
            .expect("sample");
        assert!(!report.completed);

        let chapter = &store.load().chapters["4"];
        assert!(chapter.completed);
        assert_eq!(chapter.scroll_ratio, 0.0);
    }

    #[test]
    fn non_finite_sample_leaves_stored_record_intact() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let store = Arc::new(ProgressStore::local(dir.path()));
        store.update("3", &ProgressPatch::completed());

        let mut tracker = ScrollTracker::new("3", Duration::ZERO, Arc::clone(&store));
        assert!(tracker.observe(metrics(f64::NAN), Instant::now()).is_none());

        let reloaded = ProgressStore::local(dir.path()).load();
        assert!(reloaded.chapters["3"].completed);
        assert_eq!(reloaded.last_chapter, "3");
        Ok(())
    }
}
