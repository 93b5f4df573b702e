//! Level-2 heading extraction and slug generation for deep links.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::formats::HeadingEntry;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## (.*)$").expect("valid heading regex"));
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid slug strip regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Lower-cases, strips everything but word characters, whitespace and hyphens,
/// then turns whitespace runs into single hyphens.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = NON_SLUG_RE.replace_all(&lowered, "");
    WHITESPACE_RE.replace_all(&stripped, "-").into_owned()
}

/// Hands out unique slugs: the first occurrence of a title gets the bare slug,
/// repeats get `-2`, `-3`, ... in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct Slugger {
    counts: HashMap<String, usize>,
    taken: HashSet<String>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slug(&mut self, title: &str) -> String {
        let base = slugify(title);
        let mut count = self.counts.get(&base).copied().unwrap_or(0);
        let mut candidate = if count == 0 {
            base.clone()
        } else {
            format!("{base}-{}", count + 1)
        };
        while self.taken.contains(&candidate) {
            count += 1;
            candidate = format!("{base}-{}", count + 1);
        }
        self.counts.insert(base, count + 1);
        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Raw titles of every `## ` heading line, in document order.
pub fn heading_titles(markdown: &str) -> impl Iterator<Item = &str> {
    HEADING_RE
        .captures_iter(markdown)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Indexes `markdown` with a fresh slugger.
pub fn index(markdown: &str) -> Vec<HeadingEntry> {
    index_with(markdown, &mut Slugger::new())
}

/// Indexes `markdown`, continuing from the state of `slugger`.
pub fn index_with(markdown: &str, slugger: &mut Slugger) -> Vec<HeadingEntry> {
    heading_titles(markdown)
        .map(|title| {
            let id = slugger.slug(title);
            tracing::debug!(title, id = %id, "indexed heading");
            HeadingEntry {
                id,
                title: title.to_owned(),
                level: 2,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_keeps_hangul_and_drops_punctuation() {
        assert_eq!(slugify("3-2. 어떤 주제"), "3-2-어떤-주제");
        assert_eq!(slugify("Hello,   World!"), "hello-world");
        assert_eq!(slugify("printf()와 scanf()"), "printf와-scanf");
    }

    #[test]
    fn duplicate_titles_get_counter_suffixes() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("예제"), "예제");
        assert_eq!(slugger.slug("예제"), "예제-2");
        assert_eq!(slugger.slug("예제"), "예제-3");
    }

    #[test]
    fn literal_suffix_titles_do_not_collide() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("a-2"), "a-2");
        assert_eq!(slugger.slug("a"), "a");
        assert_eq!(slugger.slug("a"), "a-3");
    }

    #[test]
    fn index_is_deterministic_across_fresh_indexers() {
        let text = "## 1-1. 변수\n본문\n## 정리\n\n## 정리\n### 세부\n";
        let first = index(text);
        let second = index(text);

        assert_eq!(first, second);
        let ids = first.iter().map(|h| h.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1-1-변수", "정리", "정리-2"]);
        assert!(first.iter().all(|h| h.level == 2));
    }

    #[test]
    fn index_tolerates_crlf() {
        let entries = index("## 첫 번째\r\n내용\r\n");
        assert_eq!(entries[0].title, "첫 번째");
        assert_eq!(entries[0].id, "첫-번째");
    }
}
