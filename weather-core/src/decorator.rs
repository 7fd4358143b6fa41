//! Wrappers that add behavior to a [`crate::WeatherProvider`] or
//! [`crate::CacheBackend`] while implementing the same trait.

pub mod caching;
pub mod instrumented;
pub mod logging;

pub use caching::CachedProvider;
pub use instrumented::InstrumentedCache;
pub use logging::{AuditEntry, AuditError, AuditEvent, AuditSink, FileAuditSink, LoggedProvider};
