//! Worker time budget

use crate::error::{PipelineError, PipelineResult};
use std::time::{Duration, Instant};

/// Share of the budget held back for the final write.
const RESERVE_DIVISOR: u32 = 10;

/// Fails fast once a worker is close to its time budget so that it never
/// writes a partial result.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
    reserve: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            reserve: budget / RESERVE_DIVISOR,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Error once less than the reserve remains.
    pub fn check(&self) -> PipelineResult<()> {
        let elapsed = self.elapsed();
        if elapsed + self.reserve >= self.budget {
            return Err(PipelineError::DeadlineExceeded {
                elapsed,
                budget: self.budget,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_deadline_passes() {
        let deadline = Deadline::new(Duration::from_secs(60));
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn test_zero_budget_fails() {
        let err = Deadline::new(Duration::ZERO).check().unwrap_err();
        assert!(matches!(err, PipelineError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_expires() {
        let deadline = Deadline::new(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(deadline.check().is_err());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }
}
