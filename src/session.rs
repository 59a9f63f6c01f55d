//! Dropdown state for a search box: the current query, keyboard cursor and
//! the temporary highlight left on a chosen entry.

use crate::{MenuEntry, MenuSearch};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a selected entry stays highlighted.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(3000);

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[derive(Debug, Clone)]
struct Highlight {
    id: String,
    expires_at: Instant,
}

pub struct SearchSession<'a, C: Clock = SystemClock> {
    search: &'a MenuSearch,
    clock: C,
    query: String,
    dropdown_open: bool,
    selected: Option<usize>,
    highlight: Option<Highlight>,
}

impl<'a> SearchSession<'a, SystemClock> {
    pub fn new(search: &'a MenuSearch) -> Self {
        Self::with_clock(search, SystemClock)
    }
}

impl<'a, C: Clock> SearchSession<'a, C> {
    pub fn with_clock(search: &'a MenuSearch, clock: C) -> Self {
        Self {
            search,
            clock,
            query: String::new(),
            dropdown_open: false,
            selected: None,
            highlight: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_dropdown_open(&self) -> bool {
        self.dropdown_open
    }

    /// Cursor into [`results`](Self::results); `None` until the user navigates.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Id of the last selected entry, until its highlight expires.
    pub fn highlighted_id(&self) -> Option<&str> {
        self.highlight
            .as_ref()
            .filter(|highlight| self.clock.now() < highlight.expires_at)
            .map(|highlight| highlight.id.as_str())
    }

    /// Ranked entries for the current query.
    pub fn results(&self) -> Vec<&'a MenuEntry> {
        self.search.rank(&self.query)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.selected = None;
        self.dropdown_open = !self.query.trim().is_empty();
    }

    /// Highlights `entry` for [`HIGHLIGHT_DURATION`] and resets the search box.
    /// A later selection replaces both the id and the deadline.
    pub fn select(&mut self, entry: &MenuEntry) {
        debug!(id = %entry.id, "Selected menu entry");
        self.highlight = Some(Highlight {
            id: entry.id.clone(),
            expires_at: self.clock.now() + HIGHLIGHT_DURATION,
        });
        self.query.clear();
        self.dropdown_open = false;
        self.selected = None;
    }

    /// Selects the entry under the cursor, or the first result without one.
    pub fn confirm_selection(&mut self) -> Option<&'a MenuEntry> {
        let results = self.results();
        let entry = *results.get(self.selected.unwrap_or(0))?;
        self.select(entry);
        Some(entry)
    }

    pub fn move_next(&mut self) {
        let len = self.results().len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) => (index + 1) % len,
            None => 0,
        });
    }

    pub fn move_previous(&mut self) {
        let len = self.results().len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) if index > 0 => index - 1,
            _ => len - 1,
        });
    }

    /// Hides the dropdown but keeps the typed query.
    pub fn close(&mut self) {
        self.dropdown_open = false;
        self.selected = None;
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = None;
    }
}
