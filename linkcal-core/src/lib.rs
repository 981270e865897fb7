//! linkcal Core Library
//!
//! A shared calendar whose identity lives in a link. This crate resolves the
//! calendar id from a location, persists events locally or to a cloud
//! document store, and keeps a calendar view in step with remote changes.

pub mod calendar_id;
pub mod coordinator;
pub mod feed;
pub mod location;
pub mod models;
pub mod status;
pub mod store;
pub mod view;

pub use calendar_id::{CalendarId, CalendarIdError};
pub use coordinator::{EditOutcome, Phase, SyncCoordinator};
pub use feed::{ChangeFeed, Subscription};
pub use location::{IdentityResolver, Location, MemoryLocation};
pub use models::{CalendarDocument, Event, EventTime, EventTimeError};
pub use status::{Status, StatusBoard, StatusKind};
pub use store::{
    Backend, CloudError, CloudStore, DocumentStore, KeyValueError, KeyValueStore, LoadSource,
    Loaded, LocalStore, MemoryDocuments, MemoryKeyValue, RemoteDocuments, Snapshot,
};
pub use view::{CalendarView, EditSignal, MemoryView, Prompter, ScriptedPrompter, Selection};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
