//! Calendar identity carried in the page location.
//!
//! The `id` query parameter of the location is the only shareable state:
//! whoever opens the same link sees the same calendar.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

use crate::calendar_id::CalendarId;

/// Name of the query parameter holding the calendar id.
pub const ID_PARAM: &str = "id";

/// Where the host currently "is".
pub trait Location: Send + Sync {
    /// The full current location.
    fn href(&self) -> Url;

    /// Replaces the current location without recording a history entry.
    fn replace(&self, url: Url);
}

/// A location held in memory that counts history entries, so that
/// navigation and replacement can be told apart.
#[derive(Debug)]
pub struct MemoryLocation {
    current: Mutex<Url>,
    history_len: AtomicUsize,
}

impl MemoryLocation {
    pub fn new(url: Url) -> Self {
        Self {
            current: Mutex::new(url),
            history_len: AtomicUsize::new(1),
        }
    }

    /// Navigates to `url`, adding a history entry.
    pub fn navigate(&self, url: Url) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = url;
        self.history_len.fetch_add(1, Ordering::SeqCst);
    }

    pub fn history_len(&self) -> usize {
        self.history_len.load(Ordering::SeqCst)
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> Url {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn replace(&self, url: Url) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = url;
    }
}

/// Derives the calendar id from a location and keeps it reflected there.
pub struct IdentityResolver<L: Location> {
    location: L,
}

impl<L: Location> IdentityResolver<L> {
    pub fn new(location: L) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    /// Reads the id from the location, or generates a fresh one when the
    /// parameter is absent, blank or unusable.
    pub fn resolve(&self) -> CalendarId {
        match id_from_url(&self.location.href()) {
            Some(id) => id,
            None => Self::generate(),
        }
    }

    /// Writes `id` into the location's query, replacing the current entry.
    pub fn publish(&self, id: &CalendarId) {
        let current = self.location.href();
        let updated = with_id(&current, id);
        if updated != current {
            tracing::debug!("Publishing calendar id {} to {}", id, updated);
            self.location.replace(updated);
        }
    }

    pub fn generate() -> CalendarId {
        CalendarId::generate()
    }

    /// The current location as a shareable link.
    pub fn share_link(&self) -> String {
        self.location.href().to_string()
    }
}

/// Extracts a usable calendar id from the `id` query parameter.
pub fn id_from_url(url: &Url) -> Option<CalendarId> {
    let raw = url
        .query_pairs()
        .find(|(key, _)| key == ID_PARAM)
        .map(|(_, value)| value.into_owned())?;

    match CalendarId::parse(&raw) {
        Ok(id) => Some(id),
        Err(e) => {
            if !raw.trim().is_empty() {
                tracing::warn!("Ignoring unusable calendar id in location: {}", e);
            }
            None
        }
    }
}

/// Returns `url` with its `id` parameter set to `id`.
///
/// The first existing `id` parameter is replaced in place, later duplicates
/// are dropped and all other parameters keep their order.
pub fn with_id(url: &Url, id: &CalendarId) -> Url {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (key, value) in url.query_pairs() {
        if key == ID_PARAM {
            if !replaced {
                pairs.push((key.into_owned(), id.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    if !replaced {
        pairs.push((ID_PARAM.to_string(), id.to_string()));
    }

    let mut updated = url.clone();
    updated.query_pairs_mut().clear().extend_pairs(pairs);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(url: &str) -> IdentityResolver<MemoryLocation> {
        IdentityResolver::new(MemoryLocation::new(Url::parse(url).unwrap()))
    }

    #[test]
    fn test_resolve_reads_query() {
        let r = resolver("http://localhost/?id=abc123");
        assert_eq!(r.resolve().as_str(), "abc123");
    }

    #[test]
    fn test_resolve_trims() {
        let r = resolver("http://localhost/?id=%20abc123%20");
        assert_eq!(r.resolve().as_str(), "abc123");
    }

    #[test]
    fn test_resolve_generates_when_absent_or_blank() {
        for url in [
            "http://localhost/",
            "http://localhost/?id=",
            "http://localhost/?id=%20%20",
            "http://localhost/?id=..%2Fetc",
        ] {
            let id = resolver(url).resolve();
            assert_eq!(id.as_str().len(), 32, "for {}", url);
        }
    }

    #[test]
    fn test_publish_then_resolve() {
        let r = resolver("http://localhost/");
        for _ in 0..20 {
            let id = CalendarId::generate();
            r.publish(&id);
            assert_eq!(r.resolve(), id);
        }
    }

    #[test]
    fn test_publish_replaces_history_entry() {
        let r = resolver("http://localhost/app?view=week");
        let id = CalendarId::parse("0123456789abcdef0123456789abcdef").unwrap();

        r.publish(&id);
        assert_eq!(r.location().history_len(), 1);
        assert_eq!(
            r.share_link(),
            "http://localhost/app?view=week&id=0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn test_publish_idempotent() {
        let r = resolver("http://localhost/");
        let id = CalendarId::generate();
        r.publish(&id);
        let first = r.share_link();
        r.publish(&id);
        assert_eq!(r.share_link(), first);
        assert_eq!(r.location().history_len(), 1);
    }

    #[test]
    fn test_with_id_replaces_in_place_and_drops_duplicates() {
        let url = Url::parse("http://localhost/?id=old&x=1&id=older").unwrap();
        let id = CalendarId::parse("new").unwrap();
        assert_eq!(with_id(&url, &id).as_str(), "http://localhost/?id=new&x=1");
    }

    #[test]
    fn test_navigate_adds_history() {
        let location = MemoryLocation::new(Url::parse("http://localhost/").unwrap());
        location.navigate(Url::parse("http://localhost/?id=abc").unwrap());
        assert_eq!(location.history_len(), 2);
        assert_eq!(id_from_url(&location.href()).unwrap().as_str(), "abc");
    }
}
