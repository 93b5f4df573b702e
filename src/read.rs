//! `ctutor read`: one-shot chapter activation and the interactive reader loop.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;

use crate::cli::ReadArgs;
use crate::commands::chapter_not_found;
use crate::config::Config;
use crate::content::ChapterCache;
use crate::link::NavigationLink;
use crate::progress::ProgressStore;
use crate::reader::ChapterContext;
use crate::reader::layout::LayoutState;
use crate::reader::navigation::{ChapterTarget, HashOutcome, NavigationController};
use crate::reader::outline::ChapterOutline;
use crate::reader::session::{
    self, Key, Launch, ReaderEffect, ReaderEvent, SessionHandle, SessionOptions,
};
use crate::reader::tracker::ViewportMetrics;
use crate::render;

pub async fn run(config: &Config, args: ReadArgs) -> anyhow::Result<()> {
    let link = match (&args.link, &args.chapter) {
        (Some(href), _) => NavigationLink::parse(href).context("parse --link")?,
        (None, Some(chapter_id)) => NavigationLink {
            chapter_id: chapter_id.clone(),
            directive: args.position,
            fragment: args.hash.clone(),
        },
        (None, None) => anyhow::bail!("either --chapter or --link is required"),
    };

    let cache = config.chapter_cache();
    let store = Arc::new(config.progress_store());
    let context = load_context(config, &cache, &link.chapter_id)?;
    let launch = Launch {
        directive: link.directive,
        fragment: link.fragment,
    };

    if args.interactive {
        return interactive(config, &cache, store, context, launch, args.html).await;
    }

    let mut controller = NavigationController::new(context, store);
    controller.activate(launch.directive);
    let anchor = match launch.fragment.as_deref().map(|f| controller.resolve_hash(f)) {
        Some(HashOutcome::InView { anchor } | HashOutcome::Moved { anchor, .. }) => Some(anchor),
        Some(HashOutcome::NotFound) | None => None,
    };

    let page = Page::new(controller.context(), args.html);
    let mut out = std::io::stdout();
    page.print_section(&mut out, controller.position().unwrap_or(0))?;
    if let Some(anchor) = anchor {
        writeln!(out, "focus #{anchor}")?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

fn load_context(
    config: &Config,
    cache: &ChapterCache,
    chapter_id: &str,
) -> anyhow::Result<ChapterContext> {
    ChapterContext::from_cache(
        cache,
        chapter_id,
        config.max_chapter,
        config.completion_policy,
    )
    .ok_or_else(|| chapter_not_found(cache, chapter_id))
}

/// What the terminal shows for one chapter.
#[derive(Debug)]
struct Page {
    title: String,
    sections: Vec<String>,
    outline: ChapterOutline,
    html: bool,
}

impl Page {
    fn new(context: &ChapterContext, html: bool) -> Self {
        let sections = crate::sections::split(&context.chapter.body);
        let outline = ChapterOutline::build(&sections);
        Self {
            title: context.chapter.title.clone(),
            sections,
            outline,
            html,
        }
    }

    fn print_section(&self, out: &mut impl Write, index: usize) -> anyhow::Result<()> {
        let Some(section) = self.sections.get(index) else {
            anyhow::bail!("section {index} missing from {}", self.title);
        };
        writeln!(out, "== {} [{}/{}] ==", self.title, index + 1, self.sections.len())?;
        if self.html {
            let mut slugger = self.outline.slugger_before(index);
            let rendered = render::render_section(section, &mut slugger);
            out.write_all(rendered.html.as_bytes())?;
        } else {
            writeln!(out, "{section}")?;
        }
        Ok(())
    }

    /// Prints `effect`; returns the chapter to switch to, if any.
    fn print_effect(
        &self,
        out: &mut impl Write,
        effect: ReaderEffect,
    ) -> anyhow::Result<Option<ChapterTarget>> {
        match effect {
            ReaderEffect::ShowSection { index, direction } => {
                tracing::debug!(index, ?direction, "show section");
                self.print_section(out, index)?;
            }
            ReaderEffect::ScrollToTop => writeln!(out, "scroll to top")?,
            ReaderEffect::FocusHeading(anchor) => writeln!(out, "focus #{anchor}")?,
            ReaderEffect::RestoreScroll(ratio) => {
                writeln!(out, "restore scroll {:.0}%", ratio * 100.0)?;
            }
            ReaderEffect::LayoutChanged { sidebar_collapsed } => {
                let state = if sidebar_collapsed { "collapsed" } else { "expanded" };
                writeln!(out, "sidebar {state}")?;
            }
            ReaderEffect::OpenChapter(target) => {
                let link = NavigationLink {
                    chapter_id: target.chapter_id.clone(),
                    directive: Some(target.directive),
                    fragment: None,
                };
                writeln!(out, "open {}", link.to_href())?;
                return Ok(Some(target));
            }
        }
        Ok(None)
    }
}

/// A running session plus the page it draws.
struct ActiveChapter {
    page: Page,
    handle: SessionHandle,
    effects: mpsc::UnboundedReceiver<ReaderEffect>,
}

#[derive(Debug, Clone, PartialEq)]
enum Input {
    Event(ReaderEvent),
    ToggleSidebar,
    Quit,
}

fn parse_input(line: &str) -> anyhow::Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('#') {
        return Ok(Some(Input::Event(ReaderEvent::HashChanged(line.to_owned()))));
    }

    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let input = match command {
        "n" | "next" => Input::Event(ReaderEvent::Next),
        "p" | "prev" => Input::Event(ReaderEvent::Previous),
        "right" => Input::Event(ReaderEvent::Key(Key::ArrowRight)),
        "left" => Input::Event(ReaderEvent::Key(Key::ArrowLeft)),
        "g" | "go" => {
            let number: usize = words
                .next()
                .context("usage: g <section>")?
                .parse()
                .context("section must be a number")?;
            let index = number.checked_sub(1).context("sections start at 1")?;
            Input::Event(ReaderEvent::GoTo(index))
        }
        "s" | "scroll" => {
            let mut value = |name: &str| -> anyhow::Result<f64> {
                words
                    .next()
                    .with_context(|| format!("usage: s <top> <doc> <viewport> (missing {name})"))?
                    .parse()
                    .with_context(|| format!("{name} must be a number"))
            };
            Input::Event(ReaderEvent::Scrolled(ViewportMetrics {
                scroll_top: value("top")?,
                document_height: value("doc")?,
                viewport_height: value("viewport")?,
            }))
        }
        "t" | "toggle" => Input::ToggleSidebar,
        "q" | "quit" => Input::Quit,
        other => anyhow::bail!("unknown command: {other}"),
    };
    Ok(Some(input))
}

async fn interactive(
    config: &Config,
    cache: &ChapterCache,
    store: Arc<ProgressStore>,
    context: ChapterContext,
    launch: Launch,
    html: bool,
) -> anyhow::Result<()> {
    let layout = LayoutState::default();
    let mut out = std::io::stdout();
    let mut current = open(config, &store, &layout, context, launch, html, &mut out).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let mut target = None;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Ok(None) => {}
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(Input::ToggleSidebar)) => {
                        layout.toggle_sidebar();
                    }
                    Ok(Some(Input::Event(event))) => {
                        if !current.handle.dispatch(event).await {
                            tracing::warn!("reader session stopped");
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(err = format!("{err:#}"), "ignoring input"),
                }
                while target.is_none()
                    && let Ok(effect) = current.effects.try_recv()
                {
                    target = current.page.print_effect(&mut out, effect)?;
                }
            }
            effect = current.effects.recv() => {
                let Some(effect) = effect else {
                    break;
                };
                target = current.page.print_effect(&mut out, effect)?;
            }
        }
        out.flush().context("flush stdout")?;

        if let Some(target) = target {
            current.handle.deactivate().await;
            let context = load_context(config, cache, &target.chapter_id)?;
            let launch = Launch {
                directive: Some(target.directive),
                fragment: None,
            };
            current = open(config, &store, &layout, context, launch, html, &mut out).await?;
        }
    }

    current.handle.finish().await;
    while let Some(effect) = current.effects.recv().await {
        current.page.print_effect(&mut out, effect)?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

/// Activates `context` and prints its first section before returning.
async fn open(
    config: &Config,
    store: &Arc<ProgressStore>,
    layout: &LayoutState,
    context: ChapterContext,
    launch: Launch,
    html: bool,
    out: &mut impl Write,
) -> anyhow::Result<ActiveChapter> {
    tracing::info!(chapter_id = %context.chapter.id, "opening chapter");
    let page = Page::new(&context, html);
    let options = SessionOptions {
        scroll_sample_interval: config.scroll_sample_interval,
        layout: Some(layout.subscribe()),
    };
    let (handle, mut effects) = session::activate(context, Arc::clone(store), launch, options);

    let first = effects
        .recv()
        .await
        .context("reader session ended before showing a section")?;
    page.print_effect(out, first)?;
    out.flush().context("flush stdout")?;

    Ok(ActiveChapter {
        page,
        handle,
        effects,
    })
}
