use std::sync::LazyLock;

use regex::Regex;

static DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^-{3,}[ \t]*\r?$").expect("valid delimiter regex"));

/// Splits a chapter body into navigable sections on `---` lines.
///
/// Blank segments are dropped. The result is never empty: a body without any
/// usable segment comes back whole as the only section.
pub fn split(body: &str) -> Vec<String> {
    let sections = DELIMITER_RE
        .split(body)
        .map(trim_blank_lines)
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();

    if sections.is_empty() {
        return vec![body.to_owned()];
    }
    sections
}

/// Removes whitespace-only lines around `segment` while keeping the
/// indentation of its first content line.
fn trim_blank_lines(segment: &str) -> &str {
    let Some(first_content) = segment.find(|c: char| !c.is_whitespace()) else {
        return "";
    };
    let line_start = segment[..first_content]
        .rfind('\n')
        .map_or(0, |newline| newline + 1);
    segment[line_start..].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_delimiters_yield_k_plus_one_sections() {
        let body = "첫째\n\n---\n\n둘째\n---\n셋째\n";
        assert_eq!(split(body), vec!["첫째", "둘째", "셋째"]);
    }

    #[test]
    fn blank_segments_are_dropped() {
        let body = "\n---\n  \n---\n내용\n---\n";
        assert_eq!(split(body), vec!["내용"]);
    }

    #[test]
    fn body_without_delimiter_is_a_single_section() {
        let body = "\n\n## 제목\n본문입니다.\n\n";
        assert_eq!(split(body), vec!["## 제목\n본문입니다."]);
    }

    #[test]
    fn crlf_and_long_rules_are_delimiters() {
        let body = "앞\r\n-----\r\n뒤\r\n";
        assert_eq!(split(body), vec!["앞", "뒤"]);
    }

    #[test]
    fn indented_code_keeps_its_indentation() {
        let body = "\n    int x = 0;\n---\n끝";
        assert_eq!(split(body), vec!["    int x = 0;", "끝"]);
    }

    #[test]
    fn whitespace_only_body_is_returned_whole() {
        assert_eq!(split("  \n "), vec!["  \n "]);
    }

    #[test]
    fn table_rules_are_not_delimiters() {
        let body = "| a | b |\n|---|---|\n| 1 | 2 |";
        assert_eq!(split(body).len(), 1);
    }
}
