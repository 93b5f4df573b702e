//! One chapter activation as a single cooperative event loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressStore;
use crate::reader::ChapterContext;
use crate::reader::layout::SidebarLayout;
use crate::reader::navigation::{
    ChapterTarget, Direction, EntryDirective, HashOutcome, NavOutcome, NavigationController,
};
use crate::reader::tracker::{ScrollTracker, ViewportMetrics};

/// Delay before focusing a heading or restoring scroll in the rendered page.
pub const FOCUS_SETTLE: Duration = Duration::from_millis(100);
/// Delay before focusing a heading after a section change.
pub const NAVIGATION_SETTLE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    Key(Key),
    Next,
    Previous,
    GoTo(usize),
    HashChanged(String),
    Scrolled(ViewportMetrics),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEffect {
    ShowSection { index: usize, direction: Direction },
    ScrollToTop,
    FocusHeading(String),
    RestoreScroll(f64),
    OpenChapter(ChapterTarget),
    LayoutChanged { sidebar_collapsed: bool },
}

/// How the chapter page was reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Launch {
    pub directive: Option<EntryDirective>,
    pub fragment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub scroll_sample_interval: Duration,
    pub layout: Option<watch::Receiver<SidebarLayout>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scroll_sample_interval: Duration::from_millis(500),
            layout: None,
        }
    }
}

/// Handle to a running reader session. Dropping it deactivates the session.
#[derive(Debug)]
pub struct SessionHandle {
    events: Option<mpsc::UnboundedSender<Envelope>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Returns `false` once the session no longer listens.
    pub fn send(&self, event: ReaderEvent) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| {
                events
                    .send(Envelope {
                        event,
                        handled: None,
                    })
                    .is_ok()
            })
    }

    /// Sends `event` and waits until the session has handled it, so its
    /// immediate effects are already queued on the effect channel.
    pub async fn dispatch(&self, event: ReaderEvent) -> bool {
        let Some(events) = self.events.as_ref() else {
            return false;
        };
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope {
            event,
            handled: Some(tx),
        };
        if events.send(envelope).is_err() {
            return false;
        }
        rx.await.is_ok()
    }

    /// Stops immediately; pending settle checks are dropped.
    pub async fn deactivate(mut self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Lets the session handle every event already sent, then stops.
    pub async fn finish(mut self) {
        self.events = None;
        self.join().await;
    }

    async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!(%err, "reader session task failed");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Activates `context` and spawns its event loop on the current runtime.
pub fn activate(
    context: ChapterContext,
    store: Arc<ProgressStore>,
    launch: Launch,
    options: SessionOptions,
) -> (SessionHandle, mpsc::UnboundedReceiver<ReaderEffect>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (effect_tx, effect_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let tracker = ScrollTracker::new(
        context.chapter.id.clone(),
        options.scroll_sample_interval,
        Arc::clone(&store),
    );
    let state = SessionState {
        controller: NavigationController::new(context, Arc::clone(&store)),
        store,
        tracker,
        effects: effect_tx,
        settle: None,
        open: true,
    };
    let task = tokio::spawn(run(state, launch, event_rx, options.layout, cancel.clone()));

    (
        SessionHandle {
            events: Some(event_tx),
            cancel,
            task: Some(task),
        },
        effect_rx,
    )
}

#[derive(Debug)]
struct Envelope {
    event: ReaderEvent,
    handled: Option<oneshot::Sender<()>>,
}

#[derive(Debug)]
enum Settle {
    Focus(String),
    RestoreScroll(f64),
}

#[derive(Debug)]
struct SessionState {
    controller: NavigationController,
    store: Arc<ProgressStore>,
    tracker: ScrollTracker,
    effects: mpsc::UnboundedSender<ReaderEffect>,
    settle: Option<(Instant, Settle)>,
    open: bool,
}

async fn run(
    mut state: SessionState,
    launch: Launch,
    mut events: mpsc::UnboundedReceiver<Envelope>,
    mut layout: Option<watch::Receiver<SidebarLayout>>,
    cancel: CancellationToken,
) {
    state.start(&launch);
    if let Some(rx) = layout.as_mut() {
        let collapsed = rx.borrow_and_update().collapsed;
        state.emit(ReaderEffect::LayoutChanged {
            sidebar_collapsed: collapsed,
        });
    }

    while state.open {
        let deadline = state.settle.as_ref().map(|(at, _)| *at);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = events.recv() => match envelope {
                Some(Envelope { event, handled }) => {
                    state.handle(event);
                    if let Some(handled) = handled {
                        let _ = handled.send(());
                    }
                }
                None => break,
            },
            changed = layout_changed(layout.as_mut()) => match changed {
                Some(current) => state.emit(ReaderEffect::LayoutChanged {
                    sidebar_collapsed: current.collapsed,
                }),
                None => layout = None,
            },
            () = settle_at(deadline) => state.fire_settle(),
        }
    }

    tracing::debug!(
        chapter_id = state.controller.chapter_id(),
        "reader session deactivated"
    );
}

async fn layout_changed(
    rx: Option<&mut watch::Receiver<SidebarLayout>>,
) -> Option<SidebarLayout> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    rx.changed().await.ok()?;
    Some(*rx.borrow_and_update())
}

async fn settle_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl SessionState {
    fn start(&mut self, launch: &Launch) {
        let stored_ratio = self
            .store
            .load()
            .chapter(self.controller.chapter_id())
            .map_or(0.0, |c| c.scroll_ratio);
        let position = self.controller.activate(launch.directive);
        self.emit(ReaderEffect::ShowSection {
            index: position,
            direction: Direction::None,
        });

        if let Some(fragment) = launch.fragment.as_deref() {
            self.handle_hash(fragment);
            return;
        }
        if launch.directive.is_some() {
            return;
        }

        if stored_ratio > 0.0 {
            self.schedule(FOCUS_SETTLE, Settle::RestoreScroll(stored_ratio));
        }
    }

    fn handle(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Key(Key::ArrowLeft) | ReaderEvent::Previous => {
                let outcome = self.controller.previous();
                self.apply(outcome);
            }
            ReaderEvent::Key(Key::ArrowRight) | ReaderEvent::Next => {
                let outcome = self.controller.next();
                self.apply(outcome);
            }
            ReaderEvent::Key(Key::Other) => {}
            ReaderEvent::GoTo(index) => {
                let outcome = self.controller.go_to(index);
                self.apply(outcome);
            }
            ReaderEvent::HashChanged(fragment) => self.handle_hash(&fragment),
            ReaderEvent::Scrolled(metrics) => {
                if let Some(report) = self.tracker.observe(metrics, Instant::now()) {
                    tracing::trace!(?report, "scroll sampled");
                }
            }
        }
    }

    fn apply(&mut self, outcome: NavOutcome) {
        match outcome {
            NavOutcome::Moved { to, direction, .. } => self.show(to, direction),
            NavOutcome::OpenChapter(target) => {
                self.settle = None;
                self.emit(ReaderEffect::OpenChapter(target));
            }
            NavOutcome::Unchanged => {}
        }
    }

    /// Shows a new section. Settle checks scheduled for the previous one are dropped.
    fn show(&mut self, index: usize, direction: Direction) {
        self.settle = None;
        self.emit(ReaderEffect::ShowSection { index, direction });
        self.emit(ReaderEffect::ScrollToTop);
    }

    fn handle_hash(&mut self, fragment: &str) {
        match self.controller.resolve_hash(fragment) {
            HashOutcome::InView { anchor } => self.schedule(FOCUS_SETTLE, Settle::Focus(anchor)),
            HashOutcome::Moved {
                to,
                direction,
                anchor,
                ..
            } => {
                self.show(to, direction);
                self.schedule(NAVIGATION_SETTLE, Settle::Focus(anchor));
            }
            HashOutcome::NotFound => {}
        }
    }

    fn schedule(&mut self, delay: Duration, settle: Settle) {
        self.settle = Some((Instant::now() + delay, settle));
    }

    fn fire_settle(&mut self) {
        let Some((_, settle)) = self.settle.take() else {
            return;
        };
        match settle {
            Settle::Focus(anchor) => {
                if self.controller.is_heading_in_view(&anchor) {
                    self.emit(ReaderEffect::FocusHeading(anchor));
                } else {
                    tracing::debug!(anchor = %anchor, "heading no longer rendered; skipping focus");
                }
            }
            Settle::RestoreScroll(ratio) => self.emit(ReaderEffect::RestoreScroll(ratio)),
        }
    }

    fn emit(&mut self, effect: ReaderEffect) {
        if self.effects.send(effect).is_err() {
            self.open = false;
        }
    }
}
