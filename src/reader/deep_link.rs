//! Maps a URL fragment onto the section holding the heading it names.

use std::sync::LazyLock;

use regex::Regex;

use crate::formats::HeadingEntry;
use crate::reader::outline::ChapterOutline;

/// Fragments of at most this many characters only ever match exactly.
pub const MIN_PARTIAL_MATCH_LEN: usize = 3;

static NUMBER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+-\d+)").expect("valid number prefix regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    Partial,
    NumberPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkHit {
    pub section: usize,
    pub anchor: String,
    pub rule: MatchRule,
}

/// Section holding the heading that best matches `fragment`.
///
/// Rules are tried in order over every heading before the next rule is
/// considered: the slug equals the fragment; one is a prefix of the other
/// (both longer than [`MIN_PARTIAL_MATCH_LEN`]); the title starts with the
/// fragment's leading `<n>-<m>` number. Within a rule the first section wins.
pub fn locate(outline: &ChapterOutline, fragment: &str) -> Option<DeepLinkHit> {
    let fragment = fragment.trim_start_matches('#');
    if fragment.is_empty() {
        return None;
    }
    let number = NUMBER_PREFIX_RE
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let first = |rule: MatchRule, matches: &dyn Fn(&HeadingEntry) -> bool| {
        outline
            .entries()
            .iter()
            .find(|entry| matches(&entry.heading))
            .map(|entry| DeepLinkHit {
                section: entry.section,
                anchor: entry.heading.id.clone(),
                rule,
            })
    };

    first(MatchRule::Exact, &|h: &HeadingEntry| h.id == fragment)
        .or_else(|| first(MatchRule::Partial, &|h: &HeadingEntry| {
            is_partial_match(&h.id, fragment)
        }))
        .or_else(|| {
            let number = number?;
            first(MatchRule::NumberPrefix, &|h: &HeadingEntry| {
                starts_with_number(&h.title, number)
            })
        })
}

fn is_partial_match(slug: &str, fragment: &str) -> bool {
    if slug.chars().count() <= MIN_PARTIAL_MATCH_LEN
        || fragment.chars().count() <= MIN_PARTIAL_MATCH_LEN
    {
        return false;
    }
    slug.starts_with(fragment) || fragment.starts_with(slug)
}

// "3-2" must not match "3-21. ...".
fn starts_with_number(title: &str, number: &str) -> bool {
    title
        .strip_prefix(number)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline() -> ChapterOutline {
        ChapterOutline::build(&[
            "## 3-1. 들어가며\n소개".to_owned(),
            "## 3-2. 어떤 주제\n내용\n## 3-21. 다른 주제".to_owned(),
            "## 연습 문제\n문제".to_owned(),
        ])
    }

    #[test]
    fn exact_slug_match() {
        let hit = locate(&outline(), "연습-문제").expect("hit");
        assert_eq!(hit.section, 2);
        assert_eq!(hit.rule, MatchRule::Exact);
    }

    #[test]
    fn partial_match_in_both_directions() {
        let hit = locate(&outline(), "3-2-어떤").expect("hit");
        assert_eq!((hit.section, hit.rule), (1, MatchRule::Partial));
        assert_eq!(hit.anchor, "3-2-어떤-주제");

        let hit = locate(&outline(), "연습-문제-풀이").expect("hit");
        assert_eq!((hit.section, hit.rule), (2, MatchRule::Partial));
    }

    #[test]
    fn number_prefix_fallback() {
        let hit = locate(&outline(), "3-2-some-topic").expect("hit");
        assert_eq!(hit.section, 1);
        assert_eq!(hit.rule, MatchRule::NumberPrefix);
        assert_eq!(hit.anchor, "3-2-어떤-주제");
    }

    #[test]
    fn number_prefix_respects_digit_boundary() {
        let hit = locate(&outline(), "3-21-x").expect("hit");
        assert_eq!(hit.anchor, "3-21-다른-주제");
    }

    #[test]
    fn short_fragments_only_match_exactly() {
        assert_eq!(locate(&outline(), "연습"), None);
        assert_eq!(locate(&outline(), ""), None);
        assert_eq!(locate(&outline(), "없는-제목"), None);
    }

    #[test]
    fn exact_slug_beats_earlier_partial_match() {
        let outline = ChapterOutline::build(&[
            "## 변수 선언\n첫 번째".to_owned(),
            "## 3-3. 중간\n내용".to_owned(),
            "## 변수 선언\n두 번째".to_owned(),
        ]);
        let hit = locate(&outline, "#변수-선언-2").expect("hit");
        assert_eq!(hit.section, 2);
        assert_eq!(hit.anchor, "변수-선언-2");
        assert_eq!(hit.rule, MatchRule::Exact);
    }

    #[test]
    fn partial_match_beats_earlier_number_prefix() {
        let outline = ChapterOutline::build(&[
            "## 3-2. 첫 주제\n".to_owned(),
            "## 3-2 어떤 주제\n".to_owned(),
        ]);
        let hit = locate(&outline, "3-2-어떤").expect("hit");
        assert_eq!((hit.section, hit.rule), (1, MatchRule::Partial));
    }
}
