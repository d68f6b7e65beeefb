// Bound on how often a dying backend gets restarted

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window limit on unexpected backend exits.
///
/// Up to `max_failures` exits inside `window` are tolerated; one more means
/// the backend is crashing as fast as we can start it.
#[derive(Debug, Clone)]
pub struct RelaunchBudget {
    max_failures: u32,
    window: Duration,
    recent: VecDeque<Instant>,
}

impl RelaunchBudget {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            recent: VecDeque::new(),
        }
    }

    /// Record a failure at `now`. Returns false once the budget is spent.
    pub fn record(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.recent.front() {
            if now.duration_since(oldest) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        self.recent.push_back(now);
        self.recent.len() <= self.max_failures as usize
    }

    pub fn failures_in_window(&self) -> usize {
        self.recent.len()
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

impl Default for RelaunchBudget {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}
