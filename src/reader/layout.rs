use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SidebarLayout {
    pub collapsed: bool,
}

/// Shared sidebar state. Sessions subscribe instead of listening for
/// page-wide toggle events.
#[derive(Debug)]
pub struct LayoutState {
    tx: watch::Sender<SidebarLayout>,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self::new(SidebarLayout::default())
    }
}

impl LayoutState {
    pub fn new(initial: SidebarLayout) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> SidebarLayout {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SidebarLayout> {
        self.tx.subscribe()
    }

    pub fn set_collapsed(&self, collapsed: bool) {
        self.tx.send_if_modified(|layout| {
            let changed = layout.collapsed != collapsed;
            layout.collapsed = collapsed;
            changed
        });
    }

    pub fn toggle_sidebar(&self) -> SidebarLayout {
        self.tx.send_modify(|layout| layout.collapsed = !layout.collapsed);
        self.current()
    }
}
