//! Section markdown to HTML.

use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, html};
use regex::Regex;

use crate::formats::HeadingEntry;
use crate::headings::Slugger;
use crate::viz::Widget;

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)\s*(/?)\s*>").expect("valid html tag regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSection {
    pub html: String,
    pub headings: Vec<HeadingEntry>,
    /// Widgets in the order their tags appear.
    pub widgets: Vec<Widget>,
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Renders one section. `slugger` carries the chapter's heading ids forward so
/// ids stay unique across sections.
pub fn render_section(markdown: &str, slugger: &mut Slugger) -> RenderedSection {
    let mut headings = Vec::new();
    let mut widgets = Vec::new();

    let events: Vec<Event<'_>> = Parser::new_ext(markdown, options())
        .into_offset_iter()
        .map(|(event, range)| match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H2,
                id: _,
                classes,
                attrs,
            }) => {
                let id = atx_title(markdown, range.start).map(|title| {
                    let id = slugger.slug(title);
                    headings.push(HeadingEntry {
                        id: id.clone(),
                        title: title.to_owned(),
                        level: 2,
                    });
                    CowStr::from(id)
                });
                Event::Start(Tag::Heading {
                    level: HeadingLevel::H2,
                    id,
                    classes,
                    attrs,
                })
            }
            Event::Html(raw) => match widget_tags(&raw) {
                Some(found) => {
                    widgets.extend(found);
                    Event::Html(raw)
                }
                None => Event::Text(raw),
            },
            Event::InlineHtml(raw) => match widget_tags(&raw) {
                Some(found) => {
                    widgets.extend(found);
                    Event::InlineHtml(raw)
                }
                None => Event::Text(raw),
            },
            other => other,
        })
        .collect();

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());

    RenderedSection {
        html: out,
        headings,
        widgets,
    }
}

/// Title of a `## ` heading that starts a source line at `start`.
fn atx_title(markdown: &str, start: usize) -> Option<&str> {
    if start != 0 && !markdown[..start].ends_with('\n') {
        return None;
    }
    let line = markdown[start..].lines().next()?;
    line.strip_prefix("## ").map(str::trim)
}

/// Opening widgets in `raw` when it holds nothing but widget tags and
/// whitespace; `None` when it must be escaped.
fn widget_tags(raw: &str) -> Option<Vec<Widget>> {
    let mut found = Vec::new();
    let mut rest = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in HTML_TAG_RE.captures_iter(raw) {
        let whole = caps.get(0)?;
        let widget = Widget::from_tag(&caps[2])?;
        if caps[1].is_empty() {
            found.push(widget);
        }
        rest.push_str(&raw[last..whole.start()]);
        last = whole.end();
    }
    rest.push_str(&raw[last..]);

    if last == 0 || !rest.trim().is_empty() {
        return None;
    }
    Some(found)
}
