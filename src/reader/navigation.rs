use std::sync::Arc;

use crate::config::CompletionPolicy;
use crate::formats::{ProgressData, ProgressPatch};
use crate::progress::ProgressStore;
use crate::reader::ChapterContext;
use crate::reader::deep_link;
use crate::reader::outline::ChapterOutline;

/// Where to land when entering a chapter from an adjacent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntryDirective {
    Start,
    End,
}

impl EntryDirective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    None,
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterTarget {
    pub chapter_id: String,
    pub directive: EntryDirective,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Moved {
        from: usize,
        to: usize,
        direction: Direction,
    },
    OpenChapter(ChapterTarget),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    /// The heading is already in the current section.
    InView { anchor: String },
    Moved {
        from: usize,
        to: usize,
        direction: Direction,
        anchor: String,
    },
    NotFound,
}

/// Section position within one activated chapter.
#[derive(Debug)]
pub struct NavigationController {
    context: ChapterContext,
    sections: Vec<String>,
    outline: ChapterOutline,
    store: Arc<ProgressStore>,
    position: Option<usize>,
    direction: Direction,
}

impl NavigationController {
    pub fn new(context: ChapterContext, store: Arc<ProgressStore>) -> Self {
        let sections = crate::sections::split(&context.chapter.body);
        let outline = ChapterOutline::build(&sections);
        Self {
            context,
            sections,
            outline,
            store,
            position: None,
            direction: Direction::None,
        }
    }

    pub fn chapter_id(&self) -> &str {
        &self.context.chapter.id
    }

    pub fn context(&self) -> &ChapterContext {
        &self.context
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn outline(&self) -> &ChapterOutline {
        &self.outline
    }

    /// `None` until [`activate`](Self::activate) has resolved a position.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn current_section(&self) -> Option<&str> {
        self.sections.get(self.position?).map(String::as_str)
    }

    fn last_index(&self) -> usize {
        self.sections.len().saturating_sub(1)
    }

    /// Resolves the starting position once per activation: an entry directive
    /// wins, then the stored section of the last active chapter, then 0.
    pub fn activate(&mut self, directive: Option<EntryDirective>) -> usize {
        if let Some(position) = self.position {
            return position;
        }

        let progress = self.store.load();
        let position = match directive {
            Some(EntryDirective::Start) => 0,
            Some(EntryDirective::End) => self.last_index(),
            None => self.restored_position(&progress).unwrap_or(0),
        };
        self.position = Some(position);

        if self.context.policy == CompletionPolicy::AutoCompletePrior {
            for earlier in &self.context.neighbors.earlier {
                if !progress.chapter(earlier).is_some_and(|c| c.completed) {
                    self.store.update(earlier, &ProgressPatch::completed());
                }
            }
        }
        self.store
            .update(self.chapter_id(), &ProgressPatch::section(position));

        tracing::info!(
            chapter_id = self.chapter_id(),
            position,
            sections = self.sections.len(),
            directive = directive.map(EntryDirective::as_str),
            "chapter activated"
        );
        position
    }

    fn restored_position(&self, progress: &ProgressData) -> Option<usize> {
        let stored = progress.resumable_section(self.chapter_id())?;
        if stored < self.sections.len() {
            return Some(stored);
        }
        tracing::debug!(
            chapter_id = self.chapter_id(),
            stored,
            sections = self.sections.len(),
            "ignoring out of range stored section"
        );
        None
    }

    pub fn next(&mut self) -> NavOutcome {
        let current = self.activate(None);
        if current < self.last_index() {
            return self.move_to(current + 1, None);
        }

        match self.context.neighbors.next.clone() {
            Some(chapter_id) => {
                self.store
                    .update(self.chapter_id(), &ProgressPatch::completed());
                tracing::info!(from = self.chapter_id(), to = %chapter_id, "next chapter");
                NavOutcome::OpenChapter(ChapterTarget {
                    chapter_id,
                    directive: EntryDirective::Start,
                })
            }
            None => NavOutcome::Unchanged,
        }
    }

    pub fn previous(&mut self) -> NavOutcome {
        let current = self.activate(None);
        if current > 0 {
            return self.move_to(current - 1, None);
        }

        match self.context.neighbors.previous.clone() {
            Some(chapter_id) => {
                tracing::info!(from = self.chapter_id(), to = %chapter_id, "previous chapter");
                NavOutcome::OpenChapter(ChapterTarget {
                    chapter_id,
                    directive: EntryDirective::End,
                })
            }
            None => NavOutcome::Unchanged,
        }
    }

    /// Jumps straight to `index`; out of range requests are ignored.
    pub fn go_to(&mut self, index: usize) -> NavOutcome {
        self.activate(None);
        if index >= self.sections.len() {
            tracing::debug!(index, sections = self.sections.len(), "ignoring go_to");
            return NavOutcome::Unchanged;
        }
        self.move_to(index, None)
    }

    /// Brings the section holding the heading named by `fragment` into view.
    /// Repeating the same fragment never moves again once positioned.
    pub fn resolve_hash(&mut self, fragment: &str) -> HashOutcome {
        let current = self.activate(None);
        let fragment = crate::link::decode_fragment(fragment.trim_start_matches('#'));
        if fragment.is_empty() {
            return HashOutcome::NotFound;
        }

        if self.is_heading_in_view(&fragment) {
            return HashOutcome::InView { anchor: fragment };
        }

        let Some(hit) = deep_link::locate(&self.outline, &fragment) else {
            tracing::warn!(
                chapter_id = self.chapter_id(),
                fragment = %fragment,
                "could not find section for deep link"
            );
            return HashOutcome::NotFound;
        };
        tracing::debug!(fragment = %fragment, ?hit, "deep link resolved");

        if hit.section == current {
            return HashOutcome::InView { anchor: hit.anchor };
        }
        match self.move_to(hit.section, Some(&hit.anchor)) {
            NavOutcome::Moved {
                from,
                to,
                direction,
            } => HashOutcome::Moved {
                from,
                to,
                direction,
                anchor: hit.anchor,
            },
            _ => HashOutcome::InView { anchor: hit.anchor },
        }
    }

    /// Whether the rendered current section carries a heading with id `anchor`.
    pub fn is_heading_in_view(&self, anchor: &str) -> bool {
        self.position
            .is_some_and(|position| self.outline.in_section(position).any(|h| h.id == anchor))
    }

    fn move_to(&mut self, to: usize, anchor: Option<&str>) -> NavOutcome {
        let from = self.activate(None);
        if to == from {
            return NavOutcome::Unchanged;
        }

        let direction = if to > from {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.position = Some(to);
        self.direction = direction;

        let mut patch = ProgressPatch::section(to);
        if to == self.last_index() {
            patch = patch.with_completed();
        }
        if let Some(anchor) = anchor {
            patch = patch.with_anchor(anchor);
        }
        self.store.update(self.chapter_id(), &patch);

        tracing::debug!(chapter_id = self.chapter_id(), from, to, "section changed");
        NavOutcome::Moved {
            from,
            to,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ChapterCache;

    const DOC: &str = "# 0장. 시작\n하나\n# 1장. 변수\n## 1-1. 변수란\n---\n## 1-2. 선언\n---\n## 1-3. 정리\n# 2장. 연산자\n## 2-1. 더하기\n";

    fn controller(
        id: &str,
        store: &Arc<ProgressStore>,
        policy: CompletionPolicy,
    ) -> NavigationController {
        let cache = ChapterCache::from_source(DOC);
        let context = ChapterContext::from_cache(&cache, id, None, policy).expect("chapter");
        NavigationController::new(context, Arc::clone(store))
    }

    #[test]
    fn fresh_chapter_starts_at_zero() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.position(), None);
        assert_eq!(nav.activate(None), 0);
        assert_eq!(store.load().last_chapter, "1");
    }

    #[test]
    fn directive_beats_stored_position() {
        let store = Arc::new(ProgressStore::in_memory());
        store.update("1", &ProgressPatch::section(1));

        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.activate(Some(EntryDirective::End)), 2);

        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.activate(Some(EntryDirective::Start)), 0);
    }

    #[test]
    fn activation_runs_once() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.activate(Some(EntryDirective::End)), 2);
        assert_eq!(nav.activate(Some(EntryDirective::Start)), 2);
    }

    #[test]
    fn stored_position_only_restores_for_last_chapter() {
        let store = Arc::new(ProgressStore::in_memory());
        store.update("1", &ProgressPatch::section(2));
        store.update("0", &ProgressPatch::section(0));

        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.activate(None), 0);
    }

    #[test]
    fn out_of_range_stored_position_falls_back_to_zero() {
        let store = Arc::new(ProgressStore::in_memory());
        store.update("1", &ProgressPatch::section(9));

        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.activate(None), 0);
    }

    #[test]
    fn reaching_last_section_completes_chapter() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        nav.activate(None);

        assert_eq!(
            nav.next(),
            NavOutcome::Moved {
                from: 0,
                to: 1,
                direction: Direction::Forward
            }
        );
        assert!(!store.load().chapters["1"].completed);
        nav.next();
        assert!(store.load().chapters["1"].completed);

        nav.previous();
        let data = store.load();
        assert!(data.chapters["1"].completed);
        assert_eq!(data.chapters["1"].current_section_index, Some(1));
        assert_eq!(nav.direction(), Direction::Backward);
    }

    #[test]
    fn chapter_edges_open_adjacent_chapters() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        nav.activate(Some(EntryDirective::End));
        assert_eq!(
            nav.next(),
            NavOutcome::OpenChapter(ChapterTarget {
                chapter_id: "2".to_owned(),
                directive: EntryDirective::Start,
            })
        );

        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        nav.activate(Some(EntryDirective::Start));
        assert_eq!(
            nav.previous(),
            NavOutcome::OpenChapter(ChapterTarget {
                chapter_id: "0".to_owned(),
                directive: EntryDirective::End,
            })
        );
    }

    #[test]
    fn book_edges_are_no_ops() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("0", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.previous(), NavOutcome::Unchanged);

        let mut nav = controller("2", &store, CompletionPolicy::SectionDriven);
        assert_eq!(nav.next(), NavOutcome::Unchanged);
        assert_eq!(nav.go_to(5), NavOutcome::Unchanged);
    }

    #[test]
    fn leaving_single_section_chapter_completes_it() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("0", &store, CompletionPolicy::SectionDriven);
        assert!(matches!(nav.next(), NavOutcome::OpenChapter(_)));
        assert!(store.load().chapters["0"].completed);
    }

    #[test]
    fn hash_navigation_is_idempotent() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        nav.activate(None);

        assert_eq!(
            nav.resolve_hash("#1-2-선언"),
            HashOutcome::Moved {
                from: 0,
                to: 1,
                direction: Direction::Forward,
                anchor: "1-2-선언".to_owned(),
            }
        );
        assert_eq!(
            nav.resolve_hash("#1-2-선언"),
            HashOutcome::InView {
                anchor: "1-2-선언".to_owned()
            }
        );
        assert_eq!(nav.position(), Some(1));
        assert_eq!(
            store.load().chapters["1"].last_anchor.as_deref(),
            Some("1-2-선언")
        );
    }

    #[test]
    fn percent_encoded_hash_is_decoded() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        let outcome = nav.resolve_hash("1-3-%EC%A0%95%EB%A6%AC");
        assert!(matches!(outcome, HashOutcome::Moved { to: 2, .. }));
    }

    #[test]
    fn unknown_hash_keeps_position() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("1", &store, CompletionPolicy::SectionDriven);
        nav.activate(None);
        assert_eq!(nav.resolve_hash("nowhere-to-be-found"), HashOutcome::NotFound);
        assert_eq!(nav.position(), Some(0));
    }

    #[test]
    fn auto_complete_policy_marks_earlier_chapters() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("2", &store, CompletionPolicy::AutoCompletePrior);
        nav.activate(None);

        let data = store.load();
        assert!(data.chapters["0"].completed);
        assert!(data.chapters["1"].completed);
        assert!(!data.chapters["2"].completed);
        assert_eq!(data.last_chapter, "2");
    }

    #[test]
    fn section_policy_leaves_earlier_chapters_alone() {
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = controller("2", &store, CompletionPolicy::SectionDriven);
        nav.activate(None);
        assert!(store.load().chapter("0").is_none());
    }

    #[test]
    fn duplicate_heading_link_opens_its_own_section() {
        let doc = "# 0장. 시작\n# 1장. 변수\n## 변수 선언\n가\n---\n## 정리\n나\n---\n## 변수 선언\n다\n";
        let cache = ChapterCache::from_source(doc);
        let context =
            ChapterContext::from_cache(&cache, "1", None, CompletionPolicy::SectionDriven)
                .expect("chapter");
        let store = Arc::new(ProgressStore::in_memory());
        let mut nav = NavigationController::new(context, store);
        nav.activate(None);
        nav.go_to(1);

        assert!(matches!(
            nav.resolve_hash("#변수-선언-2"),
            HashOutcome::Moved { to: 2, .. }
        ));
        assert_eq!(nav.position(), Some(2));
    }
}
