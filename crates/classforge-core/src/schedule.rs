//! Start-time staggering for batches of provisioning workflows.
//!
//! Workflow `i` of a batch may not begin before `i × unit` has elapsed since
//! the batch was issued. This spreads repository-creation bursts out enough
//! to stay clear of the provider's abuse detection. It is not a concurrency
//! limit: once a workflow's turn arrives it runs unpaced.

use std::time::Duration;

use tokio::time::Instant;

/// Stagger unit for clean-creation batches.
pub const CREATE_DELAY_UNIT: Duration = Duration::from_millis(5_000);

/// Stagger unit for repair batches, which issue far fewer writes.
pub const REPAIR_DELAY_UNIT: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaggerSchedule {
    unit: Duration,
}

impl StaggerSchedule {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn for_creation() -> Self {
        Self::new(CREATE_DELAY_UNIT)
    }

    pub fn for_repair() -> Self {
        Self::new(REPAIR_DELAY_UNIT)
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Offset from batch start at which workflow `index` may begin.
    pub fn delay_for(&self, index: usize) -> Duration {
        let factor = u32::try_from(index).unwrap_or(u32::MAX);
        self.unit.saturating_mul(factor)
    }

    /// Sleep until workflow `index`'s turn relative to `batch_start`.
    pub async fn wait_turn(&self, batch_start: Instant, index: usize) {
        let delay = self.delay_for(index);
        if delay.is_zero() {
            return;
        }
        tracing::debug!(index, delay_ms = delay.as_millis() as u64, "waiting for stagger slot");
        match batch_start.checked_add(delay) {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => tokio::time::sleep(delay).await,
        }
    }
}

impl Default for StaggerSchedule {
    fn default() -> Self {
        Self::for_creation()
    }
}
