//! Bounded polls against readiness predicates.
//!
//! Nothing in the workspace sleeps for a fixed time hoping the page caught
//! up. Every wait probes a condition at an interval until it holds or the
//! budget runs out, and running out is an ordinary error value.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::trace;

use crate::clock::Clock;
use crate::error::WaitError;

/// Timeout and polling interval for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    /// Total budget.
    pub timeout: Duration,
    /// Delay between probes.
    pub interval: Duration,
}

impl WaitSpec {
    /// Creates a wait spec. A zero interval is raised to one millisecond.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(Duration::from_millis(1)),
        }
    }
}

/// Polls `probe` until it yields a value or `spec.timeout` elapses.
///
/// The probe always runs at least once, so a condition that already holds
/// succeeds even with a zero budget.
pub async fn wait_for<T, F, Fut>(
    clock: &dyn Clock,
    spec: WaitSpec,
    what: &str,
    mut probe: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = clock.now();
    let mut polls = 0u32;
    loop {
        polls += 1;
        if let Some(value) = probe().await {
            trace!(what, polls, "Wait condition met");
            return Ok(value);
        }
        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed >= spec.timeout {
            return Err(WaitError::TimedOut {
                what: what.to_string(),
                after: spec.timeout,
            });
        }
        clock.sleep(spec.interval.min(spec.timeout - elapsed)).await;
    }
}

/// Polls `probe` until it reports true on `settle_polls` consecutive probes.
///
/// Used for "the page stopped changing" conditions where a single positive
/// probe may be a transient between two renders.
pub async fn wait_settled<F, Fut>(
    clock: &dyn Clock,
    spec: WaitSpec,
    what: &str,
    settle_polls: u32,
    mut probe: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let needed = settle_polls.max(1);
    let streak = AtomicU32::new(0);
    let streak = &streak;
    wait_for(clock, spec, what, move || {
        let fut = probe();
        async move {
            let next = if fut.await {
                streak.load(Ordering::Relaxed) + 1
            } else {
                0
            };
            streak.store(next, Ordering::Relaxed);
            (next >= needed).then_some(())
        }
    })
    .await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn spec(timeout_secs: u64) -> WaitSpec {
        WaitSpec::new(Duration::from_secs(timeout_secs), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_condition_already_true_with_zero_budget() {
        let clock = ManualClock::new();
        let value = wait_for(&clock, spec(0), "ready", || async { Some(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_condition_met_after_some_polls() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let value = wait_for(&clock, spec(10), "file", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { (n == 4).then_some(n) }
        })
        .await
        .unwrap();

        assert_eq!(value, 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_timeout_is_an_error_not_a_hang() {
        let clock = ManualClock::new();
        let err = wait_for(&clock, spec(5), "download", || async { None::<()> })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            WaitError::TimedOut {
                what: "download".to_string(),
                after: Duration::from_secs(5),
            }
        );
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_last_sleep_is_clamped_to_budget() {
        let clock = ManualClock::new();
        let spec = WaitSpec::new(Duration::from_millis(2500), Duration::from_secs(1));
        let _ = wait_for(&clock, spec, "x", || async { None::<()> }).await;
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_settled_requires_consecutive_positives() {
        let clock = ManualClock::new();
        // true, false, true, true
        let answers = [true, false, true, true];
        let calls = AtomicU32::new(0);
        wait_settled(&clock, spec(10), "results", 2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let answer = answers.get(n).copied().unwrap_or(true);
            async move { answer }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_settled_times_out_when_flapping() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let result = wait_settled(&clock, spec(4), "results", 2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { n % 2 == 0 }
        })
        .await;
        assert!(result.is_err());
    }
}
