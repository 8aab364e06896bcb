use chrono::{DateTime, Utc};

use crate::clock::Clock;

/// Time captured before a scan lists the bucket. Becomes the next watermark
/// once the scan finishes, so objects updated while a scan is running are
/// picked up by the following one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSnapshot(DateTime<Utc>);

impl ScanSnapshot {
    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Remembers when the previous scan started.
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    last_scan: DateTime<Utc>,
}

impl WatermarkTracker {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self { last_scan: initial }
    }

    /// Start from the current time: anything already in the bucket is old.
    pub fn starting_now(clock: &dyn Clock) -> Self {
        Self::new(clock.now())
    }

    pub fn last_scan(&self) -> DateTime<Utc> {
        self.last_scan
    }

    pub fn begin_scan(&self, clock: &dyn Clock) -> ScanSnapshot {
        ScanSnapshot(clock.now())
    }

    pub fn is_new(&self, updated_at: DateTime<Utc>) -> bool {
        updated_at > self.last_scan
    }

    /// Move the watermark to `snapshot`. Never moves backwards.
    pub fn advance(&mut self, snapshot: ScanSnapshot) {
        if snapshot.0 < self.last_scan {
            tracing::warn!(
                "Clock went backwards ({} < {}), keeping previous watermark",
                snapshot.0,
                self.last_scan
            );
            return;
        }
        self.last_scan = snapshot.0;
    }
}
