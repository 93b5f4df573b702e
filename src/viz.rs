//! Visualization widgets embedded in the tutorial markdown.
//!
//! Widgets draw themselves; the reader only knows their tag names and the
//! discrete step they are showing.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Widget {
    LoopBasic,
    ArrayFlow,
    ArraySum,
    ArrayMax,
    ArrayCount,
    ArrayReverse,
    StringNull,
    PointerBasic,
    ArrayPointer,
}

impl Widget {
    pub const ALL: [Widget; 9] = [
        Widget::LoopBasic,
        Widget::ArrayFlow,
        Widget::ArraySum,
        Widget::ArrayMax,
        Widget::ArrayCount,
        Widget::ArrayReverse,
        Widget::StringNull,
        Widget::PointerBasic,
        Widget::ArrayPointer,
    ];

    pub fn tag_name(self) -> &'static str {
        match self {
            Widget::LoopBasic => "LoopBasicViz",
            Widget::ArrayFlow => "ArrayFlowViz",
            Widget::ArraySum => "ArraySumViz",
            Widget::ArrayMax => "ArrayMaxViz",
            Widget::ArrayCount => "ArrayCountViz",
            Widget::ArrayReverse => "ArrayReverseViz",
            Widget::StringNull => "StringNullViz",
            Widget::PointerBasic => "PointerBasicViz",
            Widget::ArrayPointer => "ArrayPointerViz",
        }
    }

    /// Case-insensitive, since HTML tag names reach the renderer lower-cased.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|w| w.tag_name().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

type StepCallback = Box<dyn FnMut(usize) + Send>;

/// Current step of a widget animation, always within `[0, steps)`.
pub struct StepCursor {
    step: usize,
    steps: usize,
    on_change: Option<StepCallback>,
}

impl fmt::Debug for StepCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCursor")
            .field("step", &self.step)
            .field("steps", &self.steps)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl StepCursor {
    /// A cursor over `steps` frames; zero is treated as a single frame.
    pub fn new(steps: usize) -> Self {
        Self {
            step: 0,
            steps: steps.max(1),
            on_change: None,
        }
    }

    pub fn on_change(mut self, callback: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_last(&self) -> bool {
        self.step + 1 == self.steps
    }

    pub fn next(&mut self) -> usize {
        self.set(self.step.saturating_add(1))
    }

    pub fn previous(&mut self) -> usize {
        self.set(self.step.saturating_sub(1))
    }

    pub fn reset(&mut self) -> usize {
        self.set(0)
    }

    /// Moves to `step`, clamped to the last frame.
    pub fn set(&mut self, step: usize) -> usize {
        let step = step.min(self.steps - 1);
        if step != self.step {
            self.step = step;
            if let Some(callback) = self.on_change.as_mut() {
                callback(step);
            }
        }
        self.step
    }
}
