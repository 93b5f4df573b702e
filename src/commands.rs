use std::io::Write as _;

use anyhow::Context as _;

use crate::cli::{ChapterArgs, RenderArgs};
use crate::config::Config;
use crate::content::ChapterCache;
use crate::formats::Chapter;
use crate::link::NavigationLink;
use crate::overview::ReadingOverview;
use crate::reader::outline::ChapterOutline;
use crate::render;
use crate::sections;

pub(crate) fn chapter_not_found(cache: &ChapterCache, chapter_id: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "chapter not found: {chapter_id} (content: {})",
        cache.path().display()
    )
}

fn find_chapter(cache: &ChapterCache, chapter_id: &str) -> anyhow::Result<Chapter> {
    cache
        .chapter(chapter_id)
        .ok_or_else(|| chapter_not_found(cache, chapter_id))
}

pub fn chapters(config: &Config) -> anyhow::Result<()> {
    let cache = config.chapter_cache();
    let chapters = cache.chapters();
    if chapters.is_empty() {
        tracing::warn!(path = %cache.path().display(), "no chapters found");
    }
    let progress = config.progress_store().load();
    let overview = ReadingOverview::build(&chapters, &progress);

    let mut out = std::io::stdout().lock();
    for entry in &overview.entries {
        let active = if entry.is_last_active { "  <" } else { "" };
        writeln!(
            out,
            "[{}] {:>2}  {}{active}",
            entry.status.marker(),
            entry.chapter_id,
            entry.title
        )?;
    }
    writeln!(
        out,
        "completed {}/{} ({}%)",
        overview.completed_count,
        overview.entries.len(),
        overview.percent
    )?;
    if let Some(resume) = overview.resume {
        writeln!(out, "resume: {}", NavigationLink::chapter(resume).to_href())?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

pub fn toc(config: &Config, args: ChapterArgs) -> anyhow::Result<()> {
    let chapter = find_chapter(&config.chapter_cache(), &args.chapter)?;
    let outline = ChapterOutline::build(&sections::split(&chapter.body));

    let mut out = std::io::stdout().lock();
    for heading in outline.headings() {
        writeln!(out, "{}\t{}", heading.id, heading.title)?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

pub fn sections(config: &Config, args: ChapterArgs) -> anyhow::Result<()> {
    let chapter = find_chapter(&config.chapter_cache(), &args.chapter)?;
    let sections = sections::split(&chapter.body);
    let outline = ChapterOutline::build(&sections);

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}: {} sections", chapter.title, sections.len())?;
    for index in 0..sections.len() {
        let first = outline
            .in_section(index)
            .next()
            .map_or("-", |h| h.title.as_str());
        writeln!(out, "{:>3}  {first}", index + 1)?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

pub fn render(config: &Config, args: RenderArgs) -> anyhow::Result<()> {
    let chapter = find_chapter(&config.chapter_cache(), &args.chapter)?;
    let sections = sections::split(&chapter.body);
    let index = args
        .section
        .checked_sub(1)
        .filter(|i| *i < sections.len())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "section {} out of range: chapter {} has {} sections",
                args.section,
                chapter.id,
                sections.len()
            )
        })?;

    let mut slugger = ChapterOutline::build(&sections).slugger_before(index);
    let rendered = render::render_section(&sections[index], &mut slugger);
    if !rendered.widgets.is_empty() {
        tracing::debug!(widgets = ?rendered.widgets, "section embeds widgets");
    }

    let mut out = std::io::stdout().lock();
    out.write_all(rendered.html.as_bytes())
        .context("write rendered html")?;
    out.flush().context("flush stdout")?;
    Ok(())
}

pub fn progress_show(config: &Config) -> anyhow::Result<()> {
    let progress = config.progress_store().load();
    let json = serde_json::to_string_pretty(&progress).context("serialize progress")?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{json}")?;
    out.flush().context("flush stdout")?;
    Ok(())
}

pub fn progress_reset(config: &Config) -> anyhow::Result<()> {
    config.progress_store().reset();
    Ok(())
}
