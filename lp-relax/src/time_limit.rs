//! Cooperative time and work limit shared with the surrounding search.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Limits {
    deadline: Option<Instant>,
    work_budget: Option<u64>,
    work_done: AtomicU64,
    stopped: AtomicBool,
}

/// Shared handle polled between simplex solves and before cut rounds.
///
/// Clones observe the same limit, so the search can stop every relaxation
/// it owns at once. Work is counted in simplex iterations, which keeps runs
/// with only a work budget deterministic.
#[derive(Debug, Clone, Default)]
pub struct TimeLimit {
    inner: Arc<Limits>,
}

impl TimeLimit {
    /// A limit that is never reached unless stopped.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Create a limit from an optional wall-clock duration and an optional
    /// work budget.
    pub fn new(duration: Option<Duration>, work_budget: Option<u64>) -> Self {
        Self {
            inner: Arc::new(Limits {
                deadline: duration.map(|d| Instant::now() + d),
                work_budget,
                ..Limits::default()
            }),
        }
    }

    /// Wall-clock deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Record `amount` units of deterministic work.
    pub fn add_work(&self, amount: u64) {
        self.inner.work_done.fetch_add(amount, Ordering::Relaxed);
    }

    /// Work recorded so far.
    pub fn work_done(&self) -> u64 {
        self.inner.work_done.load(Ordering::Relaxed)
    }

    /// Remaining work before the budget is exhausted.
    pub fn remaining_work(&self) -> Option<u64> {
        self.inner
            .work_budget
            .map(|b| b.saturating_sub(self.work_done()))
    }

    /// Request every holder of this limit to stop.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Relaxed);
    }

    /// True once stopped, past the deadline or out of work.
    pub fn limit_reached(&self) -> bool {
        if self.inner.stopped.load(Ordering::Relaxed) {
            return true;
        }
        if matches!(self.remaining_work(), Some(0)) {
            return true;
        }
        match self.inner.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        let limit = TimeLimit::unlimited();
        limit.add_work(1_000_000);
        assert!(!limit.limit_reached());
        assert!(limit.remaining().is_none());
    }

    #[test]
    fn test_work_budget_shared_by_clones() {
        let limit = TimeLimit::new(None, Some(100));
        let other = limit.clone();
        other.add_work(60);
        assert_eq!(limit.remaining_work(), Some(40));
        assert!(!limit.limit_reached());
        other.add_work(40);
        assert!(limit.limit_reached());
    }

    #[test]
    fn test_stop_and_deadline() {
        let limit = TimeLimit::new(Some(Duration::from_secs(3600)), None);
        assert!(!limit.limit_reached());
        limit.clone().stop();
        assert!(limit.limit_reached());

        let expired = TimeLimit::new(Some(Duration::ZERO), None);
        assert!(expired.limit_reached());
    }
}
