//! Keeps the calendar view and its backing store in step.
//!
//! Local edits are persisted as full-replace writes of the view's event list.
//! Remote documents from the change feed replace the view's events with the
//! edit signal suppressed, so applying them never writes them back.
//!
//! Every [`SyncCoordinator::switch_to`] starts a new session with a higher
//! generation. Loads and change-feed deliveries carry the generation they
//! were started under and are dropped once it is stale.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;

use crate::calendar_id::CalendarId;
use crate::feed::Subscription;
use crate::models::{CalendarDocument, Event, EventTime};
use crate::status::StatusBoard;
use crate::store::{Backend, LoadSource};
use crate::view::{CalendarView, EditSignal, Prompter, Selection};

pub const NEW_EVENT_PROMPT: &str = "Event title:";
pub const EDIT_EVENT_PROMPT: &str = "Change event title:";
pub const DELETE_EVENT_PROMPT: &str = "Delete event?";
pub const INVALID_RANGE: &str = "Event cannot end before it starts";

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No calendar has been opened yet
    Idle,
    Loading,
    Live,
}

/// What an edit interaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    NotFound,
    Cancelled,
    Renamed,
    Deleted,
    /// An empty title was entered but deletion was declined
    Kept,
}

struct Session {
    phase: Phase,
    calendar: Option<CalendarId>,
    generation: u64,
    subscription: Option<Subscription>,
}

struct Inner {
    backend: Backend,
    status: StatusBoard,
    signal: EditSignal,
    // Lock order: session before view
    session: Mutex<Session>,
    view: Mutex<Box<dyn CalendarView>>,
    applied: watch::Sender<u64>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn view(&self) -> MutexGuard<'_, Box<dyn CalendarView>> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the view's event set without reporting it as an edit.
    fn replace_events(&self, events: &[Event]) {
        let _guard = self.signal.suppress();
        let mut view = self.view();
        for existing in view.events() {
            view.remove_event(&existing.id);
        }
        for event in events {
            view.load_event(event.clone());
        }
        drop(view);
        self.applied.send_modify(|count| *count += 1);
        tracing::debug!("Applied {} event(s) to the view", events.len());
    }

    /// Applies a change-feed delivery if its session is still current.
    fn apply_if_current(&self, generation: u64, document: CalendarDocument) {
        let session = self.session();
        if session.generation != generation || session.phase != Phase::Live {
            tracing::debug!("Dropping update from stale session {}", generation);
            return;
        }
        self.replace_events(&document.events);
    }
}

/// Cheap-clone handle to the one coordinator of a page.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn new(backend: Backend, mut view: Box<dyn CalendarView>, status: StatusBoard) -> Self {
        let signal = EditSignal::new();
        view.attach(signal.clone());
        let (applied, _rx) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                backend,
                status,
                signal,
                session: Mutex::new(Session {
                    phase: Phase::Idle,
                    calendar: None,
                    generation: 0,
                    subscription: None,
                }),
                view: Mutex::new(view),
                applied,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.session().phase
    }

    /// The calendar being shown, once one was opened.
    pub fn current(&self) -> Option<CalendarId> {
        self.inner.session().calendar.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.view().events()
    }

    pub fn status(&self) -> &StatusBoard {
        &self.inner.status
    }

    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Whether a change feed is delivering updates for the current calendar.
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .session()
            .subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Ticks once per event set applied to the view by load or change feed.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.inner.applied.subscribe()
    }

    /// Runs `f` with exclusive access to the view.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut dyn CalendarView) -> R) -> R {
        let mut view = self.inner.view();
        f(view.as_mut())
    }

    /// Makes `id` the current calendar.
    ///
    /// The previous calendar's subscription is cancelled before anything is
    /// loaded. When the load is superseded by a later switch its result is
    /// discarded.
    pub async fn switch_to(&self, id: CalendarId) {
        let generation = {
            let mut session = self.inner.session();
            if let Some(mut subscription) = session.subscription.take() {
                subscription.cancel();
            }
            session.generation += 1;
            session.phase = Phase::Loading;
            session.calendar = Some(id.clone());
            session.generation
        };

        self.inner
            .status
            .info(format!("Current calendar: {}…", id.short()));

        let loaded = self.inner.backend.load(&id, &self.inner.status).await;

        let mut session = self.inner.session();
        if session.generation != generation {
            tracing::debug!("Discarding load of {}: superseded", id);
            return;
        }

        self.inner.replace_events(&loaded.document.events);
        session.phase = Phase::Live;

        if loaded.source == LoadSource::Cloud {
            if let Some(feed) = self.inner.backend.change_feed() {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                session.subscription = Some(feed.subscribe(&id, move |document| {
                    if let Some(inner) = weak.upgrade() {
                        inner.apply_if_current(generation, document);
                    }
                }));
            }
        }
        tracing::debug!("Calendar {} is live ({:?})", id, loaded.source);
    }

    /// Replaces every event in the view with `events`.
    ///
    /// The view's change reports are suppressed meanwhile, so nothing is
    /// written back.
    pub fn apply_remote(&self, events: &[Event]) {
        self.inner.replace_events(events);
    }

    /// Persists the view's full event list. Does nothing until a calendar is
    /// live. Returns whether a write succeeded.
    pub async fn on_user_edit(&self) -> bool {
        self.inner.signal.take();

        let snapshot = {
            let session = self.inner.session();
            match (&session.calendar, session.phase) {
                (Some(id), Phase::Live) => {
                    Some((id.clone(), CalendarDocument::new(self.inner.view().events())))
                }
                _ => None,
            }
        };

        match snapshot {
            Some((id, document)) => {
                self.inner
                    .backend
                    .save(&id, &document, &self.inner.status)
                    .await
            }
            None => {
                tracing::debug!("No live calendar, edit not persisted");
                false
            }
        }
    }

    /// Persists if the view reported a change since the last write.
    pub async fn flush(&self) -> bool {
        if self.inner.signal.take() {
            self.on_user_edit().await
        } else {
            false
        }
    }

    /// Posts an error when `end` lies before `start`.
    fn rejects_range(&self, start: &EventTime, end: Option<&EventTime>) -> bool {
        let inverted = end.is_some_and(|end| end.is_before(start));
        if inverted {
            self.inner.status.error(INVALID_RANGE);
        }
        inverted
    }

    /// Creates an event from a selection, asking the user for its title.
    ///
    /// The selection is cleared whether or not an event was created.
    pub async fn create_event(
        &self,
        selection: Selection,
        prompter: &mut dyn Prompter,
    ) -> Option<String> {
        if self.rejects_range(&selection.start, selection.end.as_ref()) {
            self.inner.view().unselect();
            return None;
        }
        let title = prompter.prompt(NEW_EVENT_PROMPT, "");
        let added = {
            let mut view = self.inner.view();
            let added = match title.as_deref().map(str::trim) {
                Some(title) if !title.is_empty() => {
                    let mut event = Event::new(title, selection.start).with_all_day(selection.all_day);
                    event.end = selection.end;
                    Some(view.add_event(event))
                }
                _ => None,
            };
            view.unselect();
            added
        };

        if added.is_some() {
            self.on_user_edit().await;
        }
        added
    }

    /// Renames an event, or deletes it when the new title is empty and the
    /// user confirms.
    pub async fn edit_event(&self, id: &str, prompter: &mut dyn Prompter) -> EditOutcome {
        let current = self.inner.view().event(id);
        let Some(current) = current else {
            return EditOutcome::NotFound;
        };

        let outcome = match prompter.prompt(EDIT_EVENT_PROMPT, &current.title) {
            None => return EditOutcome::Cancelled,
            Some(title) if title.is_empty() => {
                if !prompter.confirm(DELETE_EVENT_PROMPT) {
                    return EditOutcome::Kept;
                }
                self.inner.view().remove_event(id);
                EditOutcome::Deleted
            }
            Some(title) => {
                self.inner.view().set_title(id, &title);
                EditOutcome::Renamed
            }
        };

        self.on_user_edit().await;
        outcome
    }

    /// Moves an event to `start`, as a drag would.
    ///
    /// Without an explicit `end`, the old end moves along with the start.
    /// An explicit `end` before `start` is refused.
    pub async fn move_event(&self, id: &str, start: EventTime, end: Option<EventTime>) -> bool {
        if self.rejects_range(&start, end.as_ref()) {
            return false;
        }
        let moved = {
            let mut view = self.inner.view();
            match view.event(id) {
                Some(event) => {
                    let end = end.or_else(|| {
                        let old = event.end?;
                        start
                            .since(&event.start)
                            .and_then(|delta| old.checked_add(delta))
                            .or(Some(old))
                    });
                    view.reschedule(id, start, end, start.is_date())
                }
                None => false,
            }
        };

        if moved {
            self.on_user_edit().await;
        }
        moved
    }

    /// Changes when an event ends. An end before the event's start is refused.
    pub async fn resize_event(&self, id: &str, end: EventTime) -> bool {
        let event = self.inner.view().event(id);
        let Some(event) = event else {
            return false;
        };
        if self.rejects_range(&event.start, Some(&end)) {
            return false;
        }
        let resized = self
            .inner
            .view()
            .reschedule(id, event.start, Some(end), event.all_day);

        if resized {
            self.on_user_edit().await;
        }
        resized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        DocumentStore, KeyValueStore, LocalStore, MemoryDocuments, MemoryKeyValue, CALENDARS,
        CLOUD_LOAD_ERROR,
    };
    use crate::view::{MemoryView, ScriptedPrompter};
    use serde_json::json;
    use std::time::Duration;

    fn cal(id: &str) -> CalendarId {
        CalendarId::parse(id).unwrap()
    }

    fn event(id: &str, title: &str, start: &str) -> Event {
        Event::new(title, start.parse().unwrap()).with_id(id)
    }

    fn local() -> (SyncCoordinator, Arc<MemoryKeyValue>) {
        let kv = Arc::new(MemoryKeyValue::new());
        let backend = Backend::select(None, kv.clone());
        let coordinator =
            SyncCoordinator::new(backend, Box::new(MemoryView::new()), StatusBoard::new());
        (coordinator, kv)
    }

    fn cloud() -> (SyncCoordinator, Arc<MemoryDocuments>, Arc<MemoryKeyValue>) {
        let docs = Arc::new(MemoryDocuments::new());
        let kv = Arc::new(MemoryKeyValue::new());
        let backend = Backend::select(Some(docs.clone()), kv.clone());
        let coordinator =
            SyncCoordinator::new(backend, Box::new(MemoryView::new()), StatusBoard::new());
        (coordinator, docs, kv)
    }

    async fn stored_local(kv: &Arc<MemoryKeyValue>, id: &CalendarId) -> Vec<Event> {
        let kv: Arc<dyn KeyValueStore> = kv.clone();
        LocalStore::new(kv).load(id, &StatusBoard::new()).await.events
    }

    async fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        done()
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let (coordinator, _kv) = local();
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(coordinator.current().is_none());
        assert!(!coordinator.on_user_edit().await);
    }

    #[tokio::test]
    async fn test_switch_shows_current_calendar() {
        let (coordinator, _kv) = local();
        let id = cal("0123456789abcdef0123456789abcdef");
        coordinator.switch_to(id.clone()).await;

        assert_eq!(coordinator.phase(), Phase::Live);
        assert_eq!(coordinator.current(), Some(id));
        assert_eq!(
            coordinator.status().current().unwrap().message,
            "Current calendar: 01234567…"
        );
        assert!(!coordinator.is_subscribed());
    }

    #[tokio::test]
    async fn test_local_edit_round_trip() {
        let (coordinator, kv) = local();
        let id = cal("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        coordinator.switch_to(id.clone()).await;

        let mut prompter = ScriptedPrompter::new().answer("  Lunch  ");
        let selection = Selection {
            start: "2025-05-05T12:00:00".parse().unwrap(),
            end: Some("2025-05-05T13:00:00".parse().unwrap()),
            all_day: false,
        };
        let new_id = coordinator.create_event(selection, &mut prompter).await.unwrap();

        let stored = stored_local(&kv, &id).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, new_id);
        assert_eq!(stored[0].title, "Lunch");
        assert_eq!(stored[0].end.unwrap().to_string(), "2025-05-05T13:00:00");
        assert_eq!(stored, coordinator.events());

        // A fresh coordinator on the same store sees the same calendar
        let backend = Backend::select(None, kv.clone());
        let other = SyncCoordinator::new(backend, Box::new(MemoryView::new()), StatusBoard::new());
        other.switch_to(id).await;
        assert_eq!(other.events(), stored);
    }

    #[tokio::test]
    async fn test_create_with_blank_title_does_nothing() {
        let (coordinator, kv) = local();
        coordinator.switch_to(cal("abc")).await;

        for mut prompter in [ScriptedPrompter::new().answer("   "), ScriptedPrompter::new().cancel()] {
            let selection = Selection {
                start: "2025-05-05".parse().unwrap(),
                end: None,
                all_day: true,
            };
            assert!(coordinator.create_event(selection, &mut prompter).await.is_none());
            assert_eq!(prompter.asked, vec![NEW_EVENT_PROMPT]);
        }
        assert!(coordinator.events().is_empty());
        assert_eq!(kv.write_count(), 0);
    }

    /// Delegates to a [`MemoryView`] and records unselect calls.
    struct TrackingView {
        inner: MemoryView,
        unselected: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl CalendarView for TrackingView {
        fn attach(&mut self, signal: EditSignal) {
            self.inner.attach(signal)
        }
        fn events(&self) -> Vec<Event> {
            self.inner.events()
        }
        fn add_event(&mut self, event: Event) -> String {
            self.inner.add_event(event)
        }
        fn load_event(&mut self, event: Event) {
            self.inner.load_event(event)
        }
        fn remove_event(&mut self, id: &str) -> Option<Event> {
            self.inner.remove_event(id)
        }
        fn set_title(&mut self, id: &str, title: &str) -> bool {
            self.inner.set_title(id, title)
        }
        fn reschedule(
            &mut self,
            id: &str,
            start: EventTime,
            end: Option<EventTime>,
            all_day: bool,
        ) -> bool {
            self.inner.reschedule(id, start, end, all_day)
        }
        fn unselect(&mut self) {
            self.unselected
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.unselect()
        }
    }

    #[tokio::test]
    async fn test_create_always_unselects() {
        let unselected = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let view = TrackingView {
            inner: MemoryView::new(),
            unselected: unselected.clone(),
        };
        let coordinator = SyncCoordinator::new(
            Backend::select(None, Arc::new(MemoryKeyValue::new())),
            Box::new(view),
            StatusBoard::new(),
        );
        coordinator.switch_to(cal("abc")).await;

        let selection = Selection {
            start: "2025-05-05".parse().unwrap(),
            end: None,
            all_day: true,
        };
        coordinator
            .create_event(selection.clone(), &mut ScriptedPrompter::new().cancel())
            .await;
        coordinator
            .create_event(selection, &mut ScriptedPrompter::new().answer("Kept"))
            .await;

        assert_eq!(unselected.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(coordinator.events().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_remote_is_idempotent_and_silent() {
        let (coordinator, kv) = local();
        coordinator.switch_to(cal("abc")).await;
        let writes_before = kv.write_count();

        let events = vec![
            event("1", "One", "2025-01-01"),
            event("2", "Two", "2025-01-02T10:00:00"),
        ];
        coordinator.apply_remote(&events);
        coordinator.apply_remote(&events);

        assert_eq!(coordinator.events(), events);
        assert!(!coordinator.flush().await);
        assert_eq!(kv.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_apply_remote_keeps_missing_ids() {
        let (coordinator, kv) = local();
        coordinator.switch_to(cal("abc")).await;

        let document: CalendarDocument = serde_json::from_value(json!({
            "events": [
                {"title": "A", "start": "2025-01-01", "allDay": true},
                {"id": "", "title": "B", "start": "2025-01-02", "allDay": true},
                {"id": "dup", "title": "C", "start": "2025-01-03"},
                {"id": "dup", "title": "D", "start": "2025-01-04"}
            ]
        }))
        .unwrap();

        coordinator.apply_remote(&document.events);
        assert_eq!(coordinator.events(), document.events);
        coordinator.apply_remote(&document.events);
        assert_eq!(coordinator.events(), document.events);

        assert!(!coordinator.flush().await);
        assert_eq!(kv.write_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_delete_confirmed() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[
            event("1", "Keep", "2025-01-01"),
            event("2", "Drop", "2025-01-02"),
        ]);

        let mut prompter = ScriptedPrompter::new().answer("").confirm_with(true);
        assert_eq!(coordinator.edit_event("2", &mut prompter).await, EditOutcome::Deleted);
        assert_eq!(prompter.asked, vec![EDIT_EVENT_PROMPT, DELETE_EVENT_PROMPT]);

        let stored = stored_local(&kv, &id).await;
        assert_eq!(stored, vec![event("1", "Keep", "2025-01-01")]);
    }

    #[tokio::test]
    async fn test_edit_delete_declined_writes_nothing() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[event("1", "Keep", "2025-01-01")]);
        coordinator.on_user_edit().await;
        let writes = kv.write_count();

        let mut prompter = ScriptedPrompter::new().answer("").confirm_with(false);
        assert_eq!(coordinator.edit_event("1", &mut prompter).await, EditOutcome::Kept);

        assert_eq!(kv.write_count(), writes);
        assert_eq!(stored_local(&kv, &id).await, vec![event("1", "Keep", "2025-01-01")]);
        assert_eq!(coordinator.events().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_rename_and_cancel() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[event("1", "Old", "2025-01-01")]);

        let mut cancel = ScriptedPrompter::new().cancel();
        assert_eq!(coordinator.edit_event("1", &mut cancel).await, EditOutcome::Cancelled);
        assert_eq!(kv.write_count(), 0);

        let mut rename = ScriptedPrompter::new().answer("New");
        assert_eq!(coordinator.edit_event("1", &mut rename).await, EditOutcome::Renamed);
        assert_eq!(stored_local(&kv, &id).await[0].title, "New");

        let mut nobody = ScriptedPrompter::new();
        assert_eq!(coordinator.edit_event("missing", &mut nobody).await, EditOutcome::NotFound);
        assert!(nobody.asked.is_empty());
    }

    #[tokio::test]
    async fn test_move_shifts_end() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[event("1", "Call", "2025-01-01T10:00:00")
            .with_end("2025-01-01T10:30:00".parse().unwrap())]);

        assert!(coordinator.move_event("1", "2025-01-02T09:00:00".parse().unwrap(), None).await);

        let stored = stored_local(&kv, &id).await;
        assert_eq!(stored[0].start.to_string(), "2025-01-02T09:00:00");
        assert_eq!(stored[0].end.unwrap().to_string(), "2025-01-02T09:30:00");
        assert!(!stored[0].all_day);

        assert!(!coordinator.move_event("nope", "2025-01-02".parse().unwrap(), None).await);
    }

    #[tokio::test]
    async fn test_move_without_end_keeps_it_absent() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[event("1", "Day", "2025-01-01")]);

        assert!(coordinator.move_event("1", "2025-01-05".parse().unwrap(), None).await);
        let stored = stored_local(&kv, &id).await;
        assert_eq!(stored[0].end, None);
        assert!(stored[0].all_day);
    }

    #[tokio::test]
    async fn test_move_to_timed_keeps_date_end() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[event("1", "Trip", "2025-01-01")
            .with_end("2025-01-03".parse().unwrap())]);

        assert!(coordinator.move_event("1", "2025-01-02T09:00:00".parse().unwrap(), None).await);
        let stored = stored_local(&kv, &id).await;
        assert_eq!(stored[0].end.unwrap().to_string(), "2025-01-03");
        assert!(!stored[0].all_day);
    }

    #[tokio::test]
    async fn test_resize() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        coordinator.apply_remote(&[event("1", "Trip", "2025-01-01")]);

        assert!(coordinator.resize_event("1", "2025-01-04".parse().unwrap()).await);
        let stored = stored_local(&kv, &id).await;
        assert_eq!(stored[0].end.unwrap().to_string(), "2025-01-04");
        assert!(stored[0].all_day);
    }

    #[tokio::test]
    async fn test_inverted_ranges_are_refused() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;
        let original = event("1", "Trip", "2025-01-10").with_end("2025-01-12".parse().unwrap());
        coordinator.apply_remote(&[original.clone()]);

        assert!(!coordinator.resize_event("1", "2025-01-01".parse().unwrap()).await);
        assert_eq!(coordinator.status().current().unwrap().message, INVALID_RANGE);
        coordinator.status().clear();

        let start = "2025-02-10".parse().unwrap();
        let end = Some("2025-02-01".parse().unwrap());
        assert!(!coordinator.move_event("1", start, end).await);
        assert_eq!(coordinator.status().current().unwrap().message, INVALID_RANGE);

        let selection = Selection {
            start: "2025-03-05T12:00:00".parse().unwrap(),
            end: Some("2025-03-05T11:00:00".parse().unwrap()),
            all_day: false,
        };
        let mut prompter = ScriptedPrompter::new().answer("Backwards");
        assert!(coordinator.create_event(selection, &mut prompter).await.is_none());
        assert!(prompter.asked.is_empty());

        assert_eq!(coordinator.events(), vec![original]);
        assert_eq!(kv.write_count(), 0);
    }

    #[tokio::test]
    async fn test_resize_to_start_is_allowed() {
        let (coordinator, _kv) = local();
        coordinator.switch_to(cal("abc")).await;
        coordinator.apply_remote(&[event("1", "Call", "2025-01-01T10:00:00")]);

        assert!(coordinator.resize_event("1", "2025-01-01T10:00:00".parse().unwrap()).await);
        assert!(coordinator.status().current().unwrap().message.starts_with("Current calendar"));
    }

    #[tokio::test]
    async fn test_flush_persists_direct_view_changes() {
        let (coordinator, kv) = local();
        let id = cal("abc");
        coordinator.switch_to(id.clone()).await;

        coordinator.with_view(|view| {
            view.add_event(event("x", "Direct", "2025-07-07"));
        });
        assert!(coordinator.flush().await);
        assert!(!coordinator.flush().await);
        assert_eq!(stored_local(&kv, &id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cloud_first_load_creates_document_once() {
        let (coordinator, docs, _kv) = cloud();
        let id = cal("feedfacefeedfacefeedfacefeedface");

        coordinator.switch_to(id.clone()).await;
        let stored = docs.get_raw(CALENDARS, id.as_str()).unwrap();
        assert_eq!(stored["events"], json!([]));
        assert!(stored["updatedAt"].is_i64());
        assert_eq!(docs.write_count(), 1);

        coordinator.switch_to(id).await;
        assert_eq!(docs.write_count(), 1);
    }

    #[tokio::test]
    async fn test_cloud_edits_reach_other_pages() {
        let docs = Arc::new(MemoryDocuments::new());
        let page = |docs: &Arc<MemoryDocuments>| {
            let store: Arc<dyn DocumentStore> = docs.clone();
            SyncCoordinator::new(
                Backend::select(Some(store), Arc::new(MemoryKeyValue::new())),
                Box::new(MemoryView::new()),
                StatusBoard::new(),
            )
        };
        let alice = page(&docs);
        let bob = page(&docs);
        let id = cal("0badc0de0badc0de0badc0de0badc0de");

        alice.switch_to(id.clone()).await;
        bob.switch_to(id.clone()).await;
        assert!(wait_for(|| bob.is_subscribed()).await);

        let mut prompter = ScriptedPrompter::new().answer("Party");
        let selection = Selection {
            start: "2025-08-08".parse().unwrap(),
            end: None,
            all_day: true,
        };
        alice.create_event(selection, &mut prompter).await.unwrap();

        assert!(wait_for(|| bob.events().len() == 1).await);
        assert_eq!(bob.events(), alice.events());

        // Applying the update did not echo it back
        let writes = docs.write_count();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(docs.write_count(), writes);
        assert!(!bob.flush().await);
    }

    #[tokio::test]
    async fn test_switch_cancels_previous_calendar() {
        let (coordinator, docs, _kv) = cloud();
        let a = cal("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let b = cal("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

        coordinator.switch_to(a.clone()).await;
        assert!(wait_for(|| docs.watcher_count(CALENDARS, a.as_str()) == 1).await);

        coordinator.switch_to(b.clone()).await;
        assert!(wait_for(|| docs.watcher_count(CALENDARS, a.as_str()) == 0).await);

        docs.set(
            CALENDARS,
            a.as_str(),
            json!({"events": [{"id": "a1", "title": "A only", "start": "2025-01-01"}]}),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(coordinator.events().is_empty());
        assert_eq!(coordinator.current(), Some(b));
    }

    #[tokio::test]
    async fn test_stale_delivery_is_dropped() {
        let (coordinator, _docs, _kv) = cloud();
        coordinator.switch_to(cal("aaa")).await;
        let stale = coordinator.inner.session().generation;
        coordinator.switch_to(cal("bbb")).await;

        coordinator.inner.apply_if_current(
            stale,
            CalendarDocument::new(vec![event("1", "Stale", "2025-01-01")]),
        );
        assert!(coordinator.events().is_empty());
    }

    #[tokio::test]
    async fn test_cloud_outage_falls_back_to_local_data() {
        let (coordinator, docs, kv) = cloud();
        let id = cal("abc");
        let local_events = vec![event("l", "Cached", "2025-03-03")];
        let kv_store: Arc<dyn KeyValueStore> = kv.clone();
        LocalStore::new(kv_store)
            .save(&id, &CalendarDocument::new(local_events.clone()), &StatusBoard::new())
            .await;

        docs.set_offline(true);
        coordinator.switch_to(id).await;

        assert_eq!(coordinator.phase(), Phase::Live);
        assert_eq!(coordinator.events(), local_events);
        assert_eq!(coordinator.status().current().unwrap().message, CLOUD_LOAD_ERROR);
        assert!(!coordinator.is_subscribed());
    }

    #[tokio::test]
    async fn test_updates_tick_on_apply() {
        let (coordinator, _kv) = local();
        let rx = coordinator.updates();
        coordinator.switch_to(cal("abc")).await;
        coordinator.apply_remote(&[]);
        assert_eq!(*rx.borrow(), 2);
    }
}
