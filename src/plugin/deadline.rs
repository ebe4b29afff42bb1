//! A deadline planners poll cooperatively; no work is forcibly interrupted.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// A deadline for a fallback call scaled by `ratio` of this deadline's
    /// own budget.
    pub fn scaled(&self, ratio: f64) -> Deadline {
        let millis = (self.budget.as_secs_f64() * ratio * 1000.0).floor().max(0.0);
        Deadline::starting_now(Duration::from_millis(millis as u64))
    }
}
