//! A page location remembered in a file between runs.

use linkcal_core::location::ID_PARAM;
use linkcal_core::Location;
use std::path::PathBuf;
use std::sync::Mutex;
use url::Url;

/// The CLI's stand-in for the browser address bar.
///
/// The file holds one URL. Replacing or navigating rewrites it, so the next
/// run opens the same calendar.
#[derive(Debug)]
pub struct FileLocation {
    path: PathBuf,
    current: Mutex<Url>,
}

impl FileLocation {
    /// Opens the location stored at `path`, or `fallback` if there is none
    /// or it cannot be read.
    pub fn open(path: impl Into<PathBuf>, fallback: Url) -> Self {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(contents) => match Url::parse(contents.trim()) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Ignoring stored location {}: {}", path.display(), e);
                    fallback
                }
            },
            Err(_) => fallback,
        };

        Self {
            path,
            current: Mutex::new(current),
        }
    }

    /// Goes to `url`, as following a link would.
    pub fn navigate(&self, url: Url) {
        self.replace(url);
    }

    fn persist(&self, url: &Url) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, format!("{}\n", url)) {
            tracing::warn!("Failed to remember location in {}: {}", self.path.display(), e);
        }
    }
}

impl Location for FileLocation {
    fn href(&self) -> Url {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn replace(&self, url: Url) {
        self.persist(&url);
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = url;
    }
}

/// Returns `url` without any `id` parameter.
pub fn without_id(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ID_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if pairs.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(pairs);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkcal_core::{CalendarId, IdentityResolver};
    use tempfile::tempdir;

    fn base() -> Url {
        Url::parse("http://localhost/").unwrap()
    }

    #[test]
    fn test_missing_file_uses_fallback() {
        let temp_dir = tempdir().unwrap();
        let location = FileLocation::open(temp_dir.path().join("location"), base());
        assert_eq!(location.href(), base());
    }

    #[test]
    fn test_replace_persists() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("location");

        let location = FileLocation::open(&path, base());
        location.replace(Url::parse("http://localhost/?id=abc").unwrap());

        let reopened = FileLocation::open(&path, base());
        assert_eq!(reopened.href().as_str(), "http://localhost/?id=abc");
    }

    #[test]
    fn test_garbage_file_uses_fallback() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("location");
        std::fs::write(&path, "not a url").unwrap();

        let location = FileLocation::open(&path, base());
        assert_eq!(location.href(), base());
    }

    #[test]
    fn test_resolver_remembers_calendar() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("location");

        let first = IdentityResolver::new(FileLocation::open(&path, base()));
        let id = first.resolve();
        first.publish(&id);

        let second = IdentityResolver::new(FileLocation::open(&path, base()));
        assert_eq!(second.resolve(), id);
    }

    #[test]
    fn test_without_id() {
        let url = Url::parse("http://localhost/app?id=abc&view=week").unwrap();
        assert_eq!(without_id(&url).as_str(), "http://localhost/app?view=week");

        let url = Url::parse("http://localhost/?id=abc").unwrap();
        assert_eq!(without_id(&url).as_str(), "http://localhost/");

        let id = CalendarId::parse("abc").unwrap();
        let url = linkcal_core::location::with_id(&base(), &id);
        assert_eq!(without_id(&url), base());
    }
}
