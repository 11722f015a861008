//! Circuit breaker guarding the upstream pricing API.
//!
//! State is process-local: each instance trips and recovers on its own
//! outbound traffic, while cross-instance coherence comes from the shared
//! cache and lock layer underneath.
//!
//! ```text
//! Closed    -- failure_threshold counted failures within window
//!              (and >= min_observations calls) -->                Open
//! Open      -- sleep_window elapsed -->                           HalfOpen
//! HalfOpen  -- one counted failure -->                            Open
//! HalfOpen  -- success_threshold consecutive successes -->        Closed
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Decides whether an error is evidence of upstream ill-health.
///
/// Errors where the upstream answered (4xx, malformed 200s) must return
/// `false`: they indicate caller or contract bugs, not an unhealthy peer.
pub trait BreakerClassify {
    fn counts_against_breaker(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Counted failures within `window` that trip the breaker.
    pub failure_threshold: u32,
    /// Rolling observation window.
    pub window: Duration,
    /// Minimum calls observed in the window before the breaker may trip.
    pub min_observations: u32,
    /// How long an open breaker refuses calls before probing.
    pub sleep_window: Duration,
    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(30),
            min_observations: 5,
            sleep_window: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Observable breaker state, for the health endpoint and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker refused the call without invoking the upstream.
    #[error("circuit breaker is open")]
    Open,
    /// The call was admitted and failed; the inner error is untouched.
    #[error(transparent)]
    Inner(E),
}

#[derive(Clone, Copy)]
enum State {
    Closed,
    Open { since: Instant },
    HalfOpen { successes: u32, probe_started: Option<Instant> },
}

struct Inner {
    state: State,
    /// (observed_at, counted_failure) for calls completed while not half-open.
    window: VecDeque<(Instant, bool)>,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                window: VecDeque::new(),
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            State::Closed => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Run `op` through the breaker.
    ///
    /// Refuses immediately with [`BreakerError::Open`] while open; in
    /// half-open, admits a single probe at a time.
    pub async fn call<T, E, F>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: BreakerClassify,
        F: Future<Output = Result<T, E>>,
    {
        self.admit()?;
        let result = op.await;
        let failure = result
            .as_ref()
            .err()
            .map(BreakerClassify::counts_against_breaker)
            .unwrap_or(false);
        self.observe(failure);
        result.map_err(BreakerError::Inner)
    }

    fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            State::Closed => Ok(()),
            State::Open { since } => {
                if now.duration_since(since) >= self.config.sleep_window {
                    info!(state = "half_open", "circuit breaker probing upstream");
                    inner.state = State::HalfOpen {
                        successes: 0,
                        probe_started: Some(now),
                    };
                    Ok(())
                } else {
                    Err(BreakerError::Open)
                }
            }
            State::HalfOpen {
                successes,
                probe_started,
            } => match probe_started {
                // An abandoned probe (cancelled mid-flight) must not wedge the
                // breaker; treat probes older than the sleep window as lost.
                Some(started) if now.duration_since(started) < self.config.sleep_window => {
                    Err(BreakerError::Open)
                }
                _ => {
                    inner.state = State::HalfOpen {
                        successes,
                        probe_started: Some(now),
                    };
                    Ok(())
                }
            },
        }
    }

    fn observe(&self, failure: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            State::HalfOpen { successes, .. } => {
                if failure {
                    warn!(state = "open", "circuit breaker reopened after failed probe");
                    inner.state = State::Open { since: now };
                } else {
                    let successes = successes + 1;
                    if successes >= self.config.success_threshold {
                        info!(state = "closed", "circuit breaker closed");
                        inner.state = State::Closed;
                        inner.window.clear();
                    } else {
                        inner.state = State::HalfOpen {
                            successes,
                            probe_started: None,
                        };
                    }
                }
            }
            _ => {
                inner.window.push_back((now, failure));
                if let Some(horizon) = now.checked_sub(self.config.window) {
                    while inner.window.front().is_some_and(|(t, _)| *t < horizon) {
                        inner.window.pop_front();
                    }
                }

                if matches!(inner.state, State::Closed) && failure {
                    let observations = inner.window.len() as u32;
                    let failures = inner.window.iter().filter(|(_, f)| *f).count() as u32;
                    if observations >= self.config.min_observations
                        && failures >= self.config.failure_threshold
                    {
                        warn!(
                            state = "open",
                            failures,
                            observations,
                            window_secs = self.config.window.as_secs(),
                            "circuit breaker opened"
                        );
                        inner.state = State::Open { since: now };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("infrastructure failure")]
        Counted,
        #[error("caller bug")]
        NotCounted,
    }

    impl BreakerClassify for TestError {
        fn counts_against_breaker(&self) -> bool {
            matches!(self, TestError::Counted)
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig::default())
    }

    async fn fail(b: &CircuitBreaker) {
        let _ = b.call(async { Err::<(), _>(TestError::Counted) }).await;
    }

    async fn succeed(b: &CircuitBreaker) {
        b.call(async { Ok::<_, TestError>(()) })
            .await
            .expect("call admitted and successful");
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let b = breaker();
        for _ in 0..4 {
            fail(&b).await;
            assert_eq!(b.state(), BreakerState::Closed);
        }
        fail(&b).await;
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_fails_fast_without_invoking() {
        let b = breaker();
        for _ in 0..5 {
            fail(&b).await;
        }

        let invoked = AtomicU32::new(0);
        let result = b
            .call(async {
                invoked.fetch_add(1, Ordering::Relaxed);
                Ok::<_, TestError>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(invoked.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_counted_errors_never_trip() {
        let b = breaker();
        for _ in 0..20 {
            let _ = b.call(async { Err::<(), _>(TestError::NotCounted) }).await;
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn closes_after_consecutive_probe_successes() {
        let b = breaker();
        for _ in 0..5 {
            fail(&b).await;
        }
        assert_eq!(b.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        succeed(&b).await;
        assert_eq!(b.state(), BreakerState::HalfOpen);
        succeed(&b).await;
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens() {
        let b = breaker();
        for _ in 0..5 {
            fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        fail(&b).await;
        assert_eq!(b.state(), BreakerState::Open);

        // The fresh open episode gets its own full sleep window.
        tokio::time::advance(Duration::from_secs(29)).await;
        let result = b.call(async { Ok::<_, TestError>(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open)));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_outside_window_are_forgotten() {
        let b = breaker();
        for _ in 0..4 {
            fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        // Old failures have aged out; this one starts a fresh count.
        fail(&b).await;
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn respects_minimum_observation_floor() {
        let b = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 2,
            min_observations: 5,
            ..BreakerConfig::default()
        });
        fail(&b).await;
        fail(&b).await;
        // Two failures but only two observations: below the floor.
        assert_eq!(b.state(), BreakerState::Closed);

        succeed(&b).await;
        succeed(&b).await;
        fail(&b).await;
        // Five observations, three counted failures: trips.
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn single_probe_admitted_while_half_open() {
        let b = breaker();
        for _ in 0..5 {
            fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;

        // First admit flips to half-open and claims the probe slot. A second
        // caller arriving before the probe resolves is refused.
        assert!(b.admit::<TestError>().is_ok());
        assert!(matches!(b.admit::<TestError>(), Err(BreakerError::Open)));
        b.observe(false);
        assert!(b.admit::<TestError>().is_ok());
    }
}
