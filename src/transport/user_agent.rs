//! `User-Agent` header construction.

use std::collections::BTreeMap;

use crate::backends::BackendAvailability;

/// Extra user-agent information supplied by a caller.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UserAgent {
    /// Appended verbatim.
    Text(String),
    /// Rendered as `key/value` pairs.
    Fields(BTreeMap<String, String>),
}

impl From<&str> for UserAgent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for UserAgent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Builds the `User-Agent` value sent with every download.
///
/// The header starts with `cached-path/<version>`, names each available
/// backend, then appends the caller's extra information, all separated by
/// `"; "`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use cached_path::{BackendAvailability, UserAgent, user_agent_header};
///
/// let fields = BTreeMap::from([("app".to_owned(), "demo".to_owned())]);
/// let header = user_agent_header(
///     BackendAvailability::new(true, false),
///     Some(&UserAgent::Fields(fields)),
/// );
/// assert!(header.starts_with("cached-path/"));
/// assert!(header.ends_with("; torch; app/demo"));
/// ```
#[must_use]
pub fn user_agent_header(backends: BackendAvailability, extra: Option<&UserAgent>) -> String {
    let mut header = format!("cached-path/{}", env!("CARGO_PKG_VERSION"));
    for backend in backends.available() {
        header.push_str("; ");
        header.push_str(backend.name());
    }
    match extra {
        Some(UserAgent::Text(text)) if !text.is_empty() => {
            header.push_str("; ");
            header.push_str(text);
        }
        Some(UserAgent::Fields(fields)) => {
            for (key, value) in fields {
                header.push_str("; ");
                header.push_str(key);
                header.push('/');
                header.push_str(value);
            }
        }
        Some(UserAgent::Text(_)) | None => {}
    }
    header
}
