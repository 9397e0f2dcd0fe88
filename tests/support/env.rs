//! Serialised environment overrides for configuration tests.

use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError};

use temp_env::with_vars;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Every variable the configuration loader reads, cleared unless a test sets it.
const CACHE_VARS: [&str; 6] = [
    "CACHED_PATH_CACHE_DIR",
    "CACHED_PATH_ETAG_TIMEOUT_SECS",
    "CACHED_PATH_PROXY",
    "CACHED_PATH_OBJECT_STORE_ENDPOINT",
    "CACHED_PATH_USER_AGENT",
    "CACHED_PATH_LOCAL_FILES_ONLY",
];

/// Runs `body` with `CACHED_PATH_*` set exactly to `vars`.
///
/// Not re-entrant: nesting deadlocks on the mutex held by the outer call.
pub fn with_cache_env<R>(vars: &[(&str, &str)], body: impl FnOnce() -> R) -> R {
    let pairs: Vec<(&str, Option<&str>)> = CACHE_VARS
        .iter()
        .map(|name| {
            let value = vars
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| *value);
            (*name, value)
        })
        .collect();
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
    with_vars(pairs, body)
}
