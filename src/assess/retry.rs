//! Retry with exponential backoff as an explicit state machine.
//!
//! ```text
//! Idle -> Attempting(1) -> Succeeded
//!                       -> Backoff(delay) -> Attempting(2) -> ...
//!                       -> Failed            (last attempt was transient)
//!                       -> Aborted           (non-retryable error)
//! ```

use std::time::Duration;

use log::debug;

use crate::config::AiSettings;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_settings(settings: &AiSettings) -> Self {
        Self::new(settings.max_retries, settings.base_delay_duration())
    }

    /// Backoff after the failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Sum of all backoff delays when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|n| self.delay_after(n))
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }

    /// Drive `attempt` through the state machine, sleeping with `sleep` between attempts.
    pub fn run<T, E>(
        &self,
        mut attempt: impl FnMut(u32) -> Attempt<T, E>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, RetryError<E>> {
        let mut state = RetryState::Idle;
        loop {
            state = match state {
                RetryState::Succeeded(value) => return Ok(value),
                RetryState::Failed { attempts, last } => {
                    return Err(RetryError::Exhausted { attempts, last })
                }
                RetryState::Aborted { attempts, error } => {
                    return Err(RetryError::Aborted { attempts, error })
                }
                other => other.step(self, &mut attempt, &mut sleep),
            };
        }
    }
}

/// Result of one attempt as seen by the retry loop.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Success(T),
    /// Worth retrying.
    Transient(E),
    /// Stop immediately.
    Fatal(E),
}

/// Terminal failures of [`RetryPolicy::run`].
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently.
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with a non-retryable error.
    Aborted { attempts: u32, error: E },
}

#[derive(Debug, PartialEq)]
pub enum RetryState<T, E> {
    Idle,
    Attempting(u32),
    Backoff { attempt: u32, delay: Duration },
    Succeeded(T),
    Failed { attempts: u32, last: E },
    Aborted { attempts: u32, error: E },
}

impl<T, E> RetryState<T, E> {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded(_) | Self::Failed { .. } | Self::Aborted { .. }
        )
    }

    /// Advance by one transition. Terminal states are returned unchanged.
    pub fn step(
        self,
        policy: &RetryPolicy,
        attempt: &mut impl FnMut(u32) -> Attempt<T, E>,
        sleep: &mut impl FnMut(Duration),
    ) -> Self {
        match self {
            Self::Idle => Self::Attempting(1),
            Self::Attempting(n) => match attempt(n) {
                Attempt::Success(value) => Self::Succeeded(value),
                Attempt::Fatal(error) => Self::Aborted { attempts: n, error },
                Attempt::Transient(last) if n >= policy.max_attempts => {
                    Self::Failed { attempts: n, last }
                }
                Attempt::Transient(_) => {
                    let delay = policy.delay_after(n);
                    debug!(
                        "Attempt {}/{} failed, retrying in {:.1}s",
                        n,
                        policy.max_attempts,
                        delay.as_secs_f64()
                    );
                    Self::Backoff { attempt: n, delay }
                }
            },
            Self::Backoff { attempt, delay } => {
                sleep(delay);
                Self::Attempting(attempt + 1)
            }
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(5), Duration::from_secs(16));
        assert_eq!(policy.total_backoff(), Duration::from_secs(31));
    }

    #[test]
    fn transitions() {
        let policy = RetryPolicy::new(2, Duration::from_millis(5));
        let mut slept = Vec::new();
        let mut sleep = |d| slept.push(d);
        let mut fail = |_n: u32| Attempt::<(), &str>::Transient("busy");

        let state = RetryState::Idle.step(&policy, &mut fail, &mut sleep);
        assert_eq!(state, RetryState::Attempting(1));
        let state = state.step(&policy, &mut fail, &mut sleep);
        assert_eq!(
            state,
            RetryState::Backoff {
                attempt: 1,
                delay: Duration::from_millis(5)
            }
        );
        let state = state.step(&policy, &mut fail, &mut sleep);
        assert_eq!(state, RetryState::Attempting(2));
        let state = state.step(&policy, &mut fail, &mut sleep);
        assert_eq!(
            state,
            RetryState::Failed {
                attempts: 2,
                last: "busy"
            }
        );
        assert!(state.is_terminal());
        assert_eq!(slept, vec![Duration::from_millis(5)]);
    }

    #[test]
    fn exhausts_after_exactly_max_attempts() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1));
        let mut calls = 0;
        let mut slept = Vec::new();

        let result: Result<(), _> = policy.run(
            |_| {
                calls += 1;
                Attempt::Transient("429")
            },
            |d| slept.push(d),
        );

        assert!(matches!(
            result,
            Err(RetryError::Exhausted {
                attempts: 6,
                last: "429"
            })
        ));
        assert_eq!(calls, 6);
        // No sleep after the final attempt
        assert_eq!(slept.len(), 5);
        assert_eq!(slept.iter().sum::<Duration>(), Duration::from_secs(31));
    }

    #[test]
    fn elapsed_time_covers_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        let start = Instant::now();
        let result: Result<(), _> =
            policy.run(|_| Attempt::Transient("timeout"), std::thread::sleep);
        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(70));
    }

    #[test]
    fn recovers_after_transient_failures() {
        let policy = RetryPolicy::new(6, Duration::ZERO);
        let result: Result<u32, RetryError<&str>> = policy.run(
            |n| {
                if n < 3 {
                    Attempt::Transient("503")
                } else {
                    Attempt::Success(n)
                }
            },
            |_| {},
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn fatal_error_stops_immediately() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1));
        let mut calls = 0;
        let mut slept = 0;
        let result: Result<(), _> = policy.run(
            |_| {
                calls += 1;
                Attempt::Fatal("401")
            },
            |_| slept += 1,
        );
        assert!(matches!(
            result,
            Err(RetryError::Aborted {
                attempts: 1,
                error: "401"
            })
        ));
        assert_eq!(calls, 1);
        assert_eq!(slept, 0);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
    }
}
