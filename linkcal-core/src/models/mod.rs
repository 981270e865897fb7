mod document;
mod event;

pub use document::CalendarDocument;
pub use event::{Event, EventTime, EventTimeError};
