use anyhow::Context as _;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;

use crate::reader::navigation::EntryDirective;

const LINK_BASE: &str = "https://ctutor.local/";

/// Characters escaped when writing a fragment into an href.
const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// A chapter page address: `/chapters/<id>/?position=<start|end>#<fragment>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLink {
    pub chapter_id: String,
    pub directive: Option<EntryDirective>,
    /// Fragment as written in the href, still percent-encoded.
    pub fragment: Option<String>,
}

impl NavigationLink {
    pub fn chapter(chapter_id: impl Into<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            directive: None,
            fragment: None,
        }
    }

    pub fn parse(href: &str) -> anyhow::Result<Self> {
        let base = Url::parse(LINK_BASE).context("parse link base")?;
        let url = base
            .join(href)
            .with_context(|| format!("parse link: {href}"))?;

        let mut segments = url
            .path_segments()
            .ok_or_else(|| anyhow::anyhow!("link has no path: {href}"))?
            .filter(|s| !s.is_empty());
        let (Some("chapters"), Some(chapter_id), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            anyhow::bail!("not a chapter link: {href}");
        };
        if !chapter_id.bytes().all(|b| b.is_ascii_digit()) {
            anyhow::bail!("chapter id must be numeric: {chapter_id}");
        }

        let directive = url
            .query_pairs()
            .find(|(key, _)| key == "position")
            .and_then(|(_, value)| EntryDirective::parse(&value));
        let fragment = url
            .fragment()
            .filter(|f| !f.is_empty())
            .map(str::to_owned);

        Ok(Self {
            chapter_id: chapter_id.to_owned(),
            directive,
            fragment,
        })
    }

    pub fn to_href(&self) -> String {
        let mut href = format!("/chapters/{}/", self.chapter_id);
        if let Some(directive) = self.directive {
            href.push_str("?position=");
            href.push_str(directive.as_str());
        }
        if let Some(fragment) = &self.fragment {
            href.push('#');
            href.extend(utf8_percent_encode(fragment, FRAGMENT));
        }
        href
    }
}

/// Percent-decodes a fragment. Applied once, when the reader resolves it.
pub fn decode_fragment(fragment: &str) -> String {
    percent_decode_str(fragment).decode_utf8_lossy().into_owned()
}
