//! The calendar view capability.
//!
//! The view owns the live events and reports every change to its event set
//! through an [`EditSignal`], whether the change came from the user or from
//! code. The coordinator suppresses the signal while it applies remote data.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Event, EventTime};

/// Change notifications from a view to its coordinator.
#[derive(Debug, Clone, Default)]
pub struct EditSignal {
    inner: Arc<SignalState>,
}

#[derive(Debug, Default)]
struct SignalState {
    /// Number of active suppression guards
    suppressed: AtomicUsize,
    dirty: AtomicBool,
}

impl EditSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the view whenever its event set changed.
    ///
    /// Ignored while a suppression guard is alive.
    pub fn notify(&self) {
        if self.is_suppressed() {
            return;
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.suppressed.load(Ordering::SeqCst) > 0
    }

    /// Suppresses notifications until the returned guard is dropped.
    ///
    /// Guards nest: notifications resume once every guard is gone.
    pub fn suppress(&self) -> SuppressGuard {
        self.inner.suppressed.fetch_add(1, Ordering::SeqCst);
        SuppressGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns whether a change was reported since the last call.
    pub fn take(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::SeqCst)
    }
}

/// Keeps an [`EditSignal`] suppressed while alive.
#[must_use = "notifications are only suppressed while the guard is alive"]
#[derive(Debug)]
pub struct SuppressGuard {
    inner: Arc<SignalState>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.inner.suppressed.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A date range selected in the view, from which a new event is created.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub all_day: bool,
}

/// What a calendar widget must offer to be driven by the coordinator.
pub trait CalendarView: Send {
    /// Connects the view's change callbacks to `signal`.
    fn attach(&mut self, signal: EditSignal);

    /// Snapshot of every event currently displayed.
    fn events(&self) -> Vec<Event>;

    fn event(&self, id: &str) -> Option<Event> {
        self.events().into_iter().find(|e| e.id == id)
    }

    /// Adds an event and returns its id. Events without an id get one.
    fn add_event(&mut self, event: Event) -> String;

    /// Adds an event exactly as stored, keeping its id even when empty or
    /// shared with another event.
    fn load_event(&mut self, event: Event);

    fn remove_event(&mut self, id: &str) -> Option<Event>;

    fn set_title(&mut self, id: &str, title: &str) -> bool;

    /// Moves or resizes an event.
    fn reschedule(
        &mut self,
        id: &str,
        start: EventTime,
        end: Option<EventTime>,
        all_day: bool,
    ) -> bool;

    /// Clears the current date selection.
    fn unselect(&mut self);
}

/// Asks the user things on behalf of the view.
pub trait Prompter: Send {
    /// Asks for a line of text. `None` means the user cancelled.
    fn prompt(&mut self, message: &str, default: &str) -> Option<String>;

    /// Asks a yes/no question.
    fn confirm(&mut self, message: &str) -> bool;
}

/// A prompter that replays prepared answers, for non-interactive use.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Option<String>>,
    confirmations: VecDeque<bool>,
    /// Every message shown, in order
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.answers.push_back(Some(answer.into()));
        self
    }

    pub fn cancel(mut self) -> Self {
        self.answers.push_back(None);
        self
    }

    pub fn confirm_with(mut self, yes: bool) -> Self {
        self.confirmations.push_back(yes);
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&mut self, message: &str, _default: &str) -> Option<String> {
        self.asked.push(message.to_string());
        self.answers.pop_front().flatten()
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.asked.push(message.to_string());
        self.confirmations.pop_front().unwrap_or(false)
    }
}

/// A view without a screen: keeps events in insertion order.
#[derive(Debug, Default)]
pub struct MemoryView {
    events: Vec<Event>,
    signal: EditSignal,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }
}

impl CalendarView for MemoryView {
    fn attach(&mut self, signal: EditSignal) {
        self.signal = signal;
    }

    fn events(&self) -> Vec<Event> {
        self.events.clone()
    }

    fn add_event(&mut self, mut event: Event) -> String {
        if event.id.is_empty() || self.position(&event.id).is_some() {
            event.id = Uuid::new_v4().simple().to_string();
        }
        let id = event.id.clone();
        self.load_event(event);
        id
    }

    fn load_event(&mut self, event: Event) {
        self.events.push(event);
        self.signal.notify();
    }

    fn remove_event(&mut self, id: &str) -> Option<Event> {
        let index = self.position(id)?;
        let removed = self.events.remove(index);
        self.signal.notify();
        Some(removed)
    }

    fn set_title(&mut self, id: &str, title: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.events[index].title = title.to_string();
                self.signal.notify();
                true
            }
            None => false,
        }
    }

    fn reschedule(
        &mut self,
        id: &str,
        start: EventTime,
        end: Option<EventTime>,
        all_day: bool,
    ) -> bool {
        match self.position(id) {
            Some(index) => {
                let event = &mut self.events[index];
                event.start = start;
                event.end = end;
                event.all_day = all_day;
                self.signal.notify();
                true
            }
            None => false,
        }
    }

    // No selection state without a screen
    fn unselect(&mut self) {}
}
