use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::Event;

/// The persisted unit: one calendar's complete event list.
///
/// Every write replaces the whole `events` array. `updated_at` is only
/// maintained by the cloud store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDocument {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CalendarDocument {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            updated_at: None,
        }
    }

    /// An empty document, as used for unknown or unreadable calendars.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a stored document without ever failing.
    ///
    /// A value that is not an object, or whose `events` field is missing or
    /// not an array, yields no events. Entries that do not describe an event
    /// are skipped.
    pub fn from_value_lenient(value: &Value) -> Self {
        let events = match value.get("events") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match Event::deserialize(item) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::warn!("Skipping malformed event {}: {}", item, e);
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let updated_at = value
            .get("updatedAt")
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis);

        Self { events, updated_at }
    }

    /// Parses a serialized document, falling back to the lenient reader for
    /// JSON that is well-formed but not quite the expected shape.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value_lenient(&value))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
