//! Injectable clock
//!
//! The liked-songs cache and the player state store both reason about
//! elapsed wall-clock time. They take a `Clock` instead of calling
//! `Utc::now()` directly so tests can drive time explicitly.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the current time
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    /// The real system clock
    pub fn system() -> Self {
        Self(Arc::new(Utc::now))
    }

    /// A clock driven by the given closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Current time according to this clock
    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock").finish_non_exhaustive()
    }
}
