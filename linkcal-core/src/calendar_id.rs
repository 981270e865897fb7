//! Calendar identifiers.
//!
//! Freshly generated ids are 16 random bytes rendered as 32 lowercase hex
//! characters. Ids that arrive through a shared link are kept verbatim, as
//! long as they are usable as a storage key and a URL path segment.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng, TryRngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of random bytes in a generated id.
pub const ID_BYTES: usize = 16;

/// Longest id accepted from a link.
pub const MAX_ID_LEN: usize = 128;

const HEX_ALPHABET: &[u8; 16] = b"abcdef0123456789";

/// Errors that can occur when parsing a calendar id
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CalendarIdError {
    #[error("Calendar id is empty")]
    Empty,

    #[error("Calendar id is too long: {0} characters (max {MAX_ID_LEN})")]
    TooLong(usize),

    #[error("Calendar id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Identifier of one shared calendar.
///
/// Used both as the storage key of the calendar's document and as the `id`
/// query value of the shareable link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarId(String);

impl CalendarId {
    /// Generate a new random id from the operating system's secure source.
    pub fn generate() -> Self {
        Self::generate_from(&mut OsRng)
    }

    /// Generate an id from `rng`, falling back to a time-seeded generator
    /// when the source reports a failure.
    pub fn generate_from<R: TryRngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; ID_BYTES];
        match rng.try_fill_bytes(&mut bytes) {
            Ok(()) => Self(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
            Err(e) => {
                tracing::warn!("Secure random source unavailable ({}), using fallback", e);
                Self::generate_fallback()
            }
        }
    }

    fn generate_fallback() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let mut rng = StdRng::seed_from_u64(seed ^ u64::from(std::process::id()));
        let id = (0..ID_BYTES * 2)
            .map(|_| HEX_ALPHABET[rng.random_range(0..HEX_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Parse an id taken from a link or a storage key.
    ///
    /// Surrounding whitespace is trimmed; the rest is kept as-is.
    pub fn parse(s: &str) -> Result<Self, CalendarIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CalendarIdError::Empty);
        }
        if s.len() > MAX_ID_LEN {
            return Err(CalendarIdError::TooLong(s.len()));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(CalendarIdError::InvalidChar(c));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form shown to users (first 8 characters).
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }

    /// Key of this calendar in the local key-value store.
    pub fn storage_key(&self) -> String {
        format!("calendar:{}", self.0)
    }
}

impl std::fmt::Display for CalendarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CalendarId {
    type Err = CalendarIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for CalendarId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for CalendarId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CalendarId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
