//! Shared tracing configuration for observability instrumentation.
//!
//! Centralises the log targets used by the crate so subscribers can filter
//! cache and transport events without pulling in unrelated application logs.

/// Target used by top-level resolution spans and logs.
pub(crate) const LOG_TARGET: &str = "cached_path::observability";

/// Target used by cache lookup, population, and extraction.
pub(crate) const CACHE_LOG_TARGET: &str = "cached_path::cache";

/// Target used by the HTTP and object-storage transport.
pub(crate) const TRANSPORT_LOG_TARGET: &str = "cached_path::transport";
