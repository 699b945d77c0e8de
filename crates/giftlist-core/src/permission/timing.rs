use std::time::{Duration, Instant};

/// Minimum latency of every denial.
///
/// Padding happens after the decision and outside any transaction, so a
/// denied caller never holds the writer slot while sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenialFloor(Duration);

impl DenialFloor {
    pub fn new(floor: Duration) -> Self {
        Self(floor)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Sleep until at least the floor has passed since `started`.
    pub async fn pad(&self, started: Instant) {
        if let Some(remaining) = self.0.checked_sub(started.elapsed())
            && !remaining.is_zero()
        {
            tokio::time::sleep(remaining).await;
        }
    }
}
