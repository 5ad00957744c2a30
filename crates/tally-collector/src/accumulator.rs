//! Accumulator shapes driven by collectors.
//!
//! The engine never looks inside an accumulator; it only hands it to the
//! consumer's `on_collect` and, once collection stops, turns it into its
//! output with [`Accumulator::finish`].

use tally_core::ActorId;

use crate::event::{Event, EventKind, Flow};

/// Value built up by a collector and consumed at finalization.
pub trait Accumulator: Send + 'static {
    type Output: Send + 'static;

    fn finish(self) -> Self::Output;
}

pub const DEFAULT_SEPARATOR: &str = "-";

/// Ordered, duplicate-free set of `(actor, token)` choices with a confirm token.
///
/// Choosing a pair that is already present is a no-op; choosing the confirm
/// token asks the collector to stop.
#[derive(Debug, Clone)]
pub struct SelectionSet {
    entries: Vec<(ActorId, String)>,
    confirm: String,
    separator: String,
}

impl SelectionSet {
    pub fn new(confirm: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            confirm: confirm.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn choose(&mut self, actor: ActorId, token: &str) -> Flow {
        if token == self.confirm {
            return Flow::Stop;
        }
        if !self.contains(actor, token) {
            self.entries.push((actor, token.to_string()));
        }
        Flow::Continue
    }

    /// Apply a collected event. Removals never un-choose a token.
    pub fn apply(&mut self, event: &Event) -> Flow {
        match event.kind {
            EventKind::ReactionAdd | EventKind::ButtonClick => {
                self.choose(event.actor_id, &event.payload)
            }
            EventKind::ReactionRemove => Flow::Continue,
        }
    }

    pub fn contains(&self, actor: ActorId, token: &str) -> bool {
        self.entries.iter().any(|(a, t)| *a == actor && t == token)
    }

    /// Tokens in the order they were chosen.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, t)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn joined(&self) -> String {
        self.tokens().collect::<Vec<_>>().join(&self.separator)
    }
}

impl Accumulator for SelectionSet {
    type Output = String;

    fn finish(self) -> String {
        self.joined()
    }
}

/// Navigation controls of a paginated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageControl {
    First,
    Previous,
    Next,
    Last,
}

impl PageControl {
    /// Rendering order of the controls.
    pub const ALL: [PageControl; 4] = [
        PageControl::First,
        PageControl::Previous,
        PageControl::Next,
        PageControl::Last,
    ];

    /// Control id carried by button events.
    pub fn id(self) -> &'static str {
        match self {
            PageControl::First => "first",
            PageControl::Previous => "previous",
            PageControl::Next => "next",
            PageControl::Last => "last",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

/// Bounded cursor over `[0, page_count - 1]`. All moves clamp; nothing wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    cursor: usize,
    page_count: usize,
}

impl Pager {
    /// `None` for fewer than two pages: there is nothing to navigate.
    pub fn new(page_count: usize) -> Option<Self> {
        (page_count >= 2).then_some(Self {
            cursor: 0,
            page_count,
        })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    fn last(&self) -> usize {
        self.page_count - 1
    }

    fn target(&self, control: PageControl) -> usize {
        match control {
            PageControl::First => 0,
            PageControl::Last => self.last(),
            PageControl::Previous => self.cursor.saturating_sub(1),
            PageControl::Next => (self.cursor + 1).min(self.last()),
        }
    }

    /// Move the cursor. Returns whether it changed.
    pub fn apply(&mut self, control: PageControl) -> bool {
        let next = self.target(control);
        let changed = next != self.cursor;
        self.cursor = next;
        changed
    }

    /// Apply a button event; unknown control ids are ignored. Never stops.
    pub fn apply_event(&mut self, event: &Event) -> Flow {
        if let Some(control) = PageControl::parse(&event.payload) {
            self.apply(control);
        }
        Flow::Continue
    }

    /// Whether pressing `control` would move the cursor (used to grey out buttons).
    pub fn can_move(&self, control: PageControl) -> bool {
        self.target(control) != self.cursor
    }
}

impl Accumulator for Pager {
    type Output = usize;

    fn finish(self) -> usize {
        self.cursor
    }
}
