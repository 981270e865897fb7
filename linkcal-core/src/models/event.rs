use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing an event timestamp
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventTimeError {
    #[error("Invalid event time '{0}': expected YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or RFC 3339")]
    Invalid(String),
}

/// A point in time as a calendar widget reports it.
///
/// All-day events carry plain dates, timed events carry either a floating
/// local date-time or a date-time with an explicit offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    Date(NaiveDate),
    Floating(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// The calendar date this time falls on.
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::Floating(dt) => dt.date(),
            EventTime::Offset(dt) => dt.date_naive(),
        }
    }

    /// Time elapsed from `earlier` to `self`, if both are of the same kind.
    pub fn since(&self, earlier: &EventTime) -> Option<Duration> {
        match (self, earlier) {
            (EventTime::Date(a), EventTime::Date(b)) => Some(a.signed_duration_since(*b)),
            (EventTime::Floating(a), EventTime::Floating(b)) => Some(a.signed_duration_since(*b)),
            (EventTime::Offset(a), EventTime::Offset(b)) => Some(a.signed_duration_since(*b)),
            _ => None,
        }
    }

    /// Whether `self` lies strictly before `other`.
    ///
    /// Times of different kinds are compared by calendar date.
    pub fn is_before(&self, other: &EventTime) -> bool {
        match self.since(other) {
            Some(delta) => delta < Duration::zero(),
            None => self.date() < other.date(),
        }
    }

    /// Dates move by whole days only.
    pub fn checked_add(&self, delta: Duration) -> Option<EventTime> {
        match self {
            EventTime::Date(d) => d.checked_add_signed(delta).map(EventTime::Date),
            EventTime::Floating(dt) => dt.checked_add_signed(delta).map(EventTime::Floating),
            EventTime::Offset(dt) => dt.checked_add_signed(delta).map(EventTime::Offset),
        }
    }
}

impl FromStr for EventTime {
    type Err = EventTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(EventTime::Offset(dt));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(EventTime::Floating(dt));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(EventTime::Date)
            .map_err(|_| EventTimeError::Invalid(s.to_string()))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::Floating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            EventTime::Offset(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl Serialize for EventTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One calendar entry.
///
/// The persisted form is a plain snapshot of what the view displays. An
/// absent `end` means a point-in-time or open-ended event and stays absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Assigned by the view to events created here. Documents written
    /// elsewhere may leave it empty or repeat it.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub all_day: bool,
}

impl Event {
    /// Creates an event that has not been given an id yet.
    pub fn new(title: impl Into<String>, start: EventTime) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            start,
            end: None,
            all_day: start.is_date(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)?;
        if let Some(end) = &self.end {
            write!(f, " - {}", end)?;
        }
        if self.all_day {
            write!(f, " (all day)")?;
        }
        write!(f, "  {}", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let t: EventTime = "2025-03-01".parse().unwrap();
        assert_eq!(
            t,
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert!(t.is_date());
        assert_eq!(t.to_string(), "2025-03-01");
    }

    #[test]
    fn test_parse_floating() {
        let t: EventTime = "2025-03-01T10:30:00".parse().unwrap();
        assert!(matches!(t, EventTime::Floating(_)));
        assert_eq!(t.to_string(), "2025-03-01T10:30:00");

        let short: EventTime = "2025-03-01T10:30".parse().unwrap();
        assert_eq!(short, t);
    }

    #[test]
    fn test_parse_offset() {
        let t: EventTime = "2025-03-01T10:30:00+02:00".parse().unwrap();
        assert!(matches!(t, EventTime::Offset(_)));
        assert_eq!(t.to_string(), "2025-03-01T10:30:00+02:00");

        let utc: EventTime = "2025-03-01T08:30:00.000Z".parse().unwrap();
        assert_eq!(utc.to_string(), "2025-03-01T08:30:00Z");
        assert_eq!(t.date(), utc.date());
    }

    #[test]
    fn test_parse_invalid() {
        let result = "next tuesday".parse::<EventTime>();
        assert_eq!(
            result,
            Err(EventTimeError::Invalid("next tuesday".to_string()))
        );
    }

    #[test]
    fn test_shift_keeps_kind() {
        let start: EventTime = "2025-03-01T10:00:00".parse().unwrap();
        let moved: EventTime = "2025-03-02T12:00:00".parse().unwrap();
        let delta = moved.since(&start).unwrap();
        assert_eq!(delta, Duration::hours(26));

        let end: EventTime = "2025-03-01T11:00:00".parse().unwrap();
        assert_eq!(end.checked_add(delta).unwrap().to_string(), "2025-03-02T13:00:00");

        let day: EventTime = "2025-03-01".parse().unwrap();
        assert_eq!(day.checked_add(Duration::days(3)).unwrap().to_string(), "2025-03-04");
        assert!(day.since(&start).is_none());
    }

    #[test]
    fn test_is_before() {
        let day: EventTime = "2025-03-02".parse().unwrap();
        let earlier_day: EventTime = "2025-03-01".parse().unwrap();
        assert!(earlier_day.is_before(&day));
        assert!(!day.is_before(&earlier_day));
        assert!(!day.is_before(&day));

        let morning: EventTime = "2025-03-02T09:00:00".parse().unwrap();
        let evening: EventTime = "2025-03-02T18:00:00".parse().unwrap();
        assert!(morning.is_before(&evening));

        // Mixed kinds on the same date are not ordered
        assert!(!morning.is_before(&day));
        assert!(!day.is_before(&morning));
        assert!(earlier_day.is_before(&morning));
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::new("Standup", "2025-03-03T09:00:00".parse().unwrap())
            .with_id("ev-1")
            .with_end("2025-03-03T09:15:00".parse().unwrap());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["id"], "ev-1");
        assert_eq!(value["title"], "Standup");
        assert_eq!(value["start"], "2025-03-03T09:00:00");
        assert_eq!(value["end"], "2025-03-03T09:15:00");
        assert_eq!(value["allDay"], false);
    }

    #[test]
    fn test_absent_end_stays_absent() {
        let event = Event::new("Holiday", "2025-12-25".parse().unwrap());
        assert!(event.all_day);

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("end"));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.end, None);
        assert_eq!(back, event);
    }

    #[test]
    fn test_deserialize_with_missing_optional_fields() {
        let event: Event = serde_json::from_str(r#"{"start": "2025-01-01"}"#).unwrap();
        assert_eq!(event.id, "");
        assert_eq!(event.title, "");
        assert!(!event.all_day);
    }
}
