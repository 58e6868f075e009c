use std::sync::{Mutex, PoisonError};

use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Wall clock the scheduler evaluates cycles against.
pub trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

/// Local time at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: UtcOffset,
}

impl LocalClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Detects the local offset, falling back to UTC.
    ///
    /// Must run before any other thread is spawned, otherwise the offset
    /// cannot be determined soundly on most platforms.
    pub fn detect() -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or_else(|e| {
            tracing::warn!("Local offset unavailable, using UTC: {}", e);
            UtcOffset::UTC
        });
        Self::new(offset)
    }
}

impl Clock for LocalClock {
    fn now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<PrimitiveDateTime>,
}

impl FixedClock {
    pub fn new(now: PrimitiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: PrimitiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
