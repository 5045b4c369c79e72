use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio::time::sleep;

/// Delay strategy between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,

    /// Delay doubles after every failed attempt
    Exponential,
}

/// Bounded retry policy.
///
/// `max_attempts` counts the first call, so 3 means one call
/// plus at most two retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            delay: initial_delay,
            backoff: Backoff::Exponential,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        }
    }
}

/// Final failure after every attempt was used.
#[derive(Debug, thiserror::Error)]
#[error("retries exhausted after {attempts} attempts: {last}")]
pub struct RetriesExhausted<E: Debug + Display> {
    pub attempts: u32,
    pub last: E,
}

/// Runs `op` until it succeeds or `policy.max_attempts` is reached.
///
/// Used around whole jobs. The last error is handed back to the
/// caller wrapped in `RetriesExhausted`.
///
/// GUARANTEES:
/// - `op` is invoked at most `max_attempts` times
/// - no delay after the final attempt
///
pub async fn with_retry<T, E, F, Fut>(
    mut op: F,
    policy: &RetryPolicy,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Debug + Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max => {
                warn!("Retries exhausted after {} attempts: {}", attempt, e);
                return Err(RetriesExhausted { attempts: attempt, last: e });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Attempt {} failed: {}. Retrying in {}ms...",
                    attempt,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Field-level variant for idempotent reads.
///
/// Same attempt loop, but the final failure is swallowed into an
/// error-shaped JSON string (`{"error": "..."}`) so the request
/// layer can keep treating it as "no data".
pub async fn with_backoff<T, E, F, Fut>(op: F, policy: &RetryPolicy) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Debug + Display,
{
    with_retry(op, policy)
        .await
        .map_err(|exhausted| error_string(&exhausted.last))
}

/// `{"error": "<reason>"}`
pub fn error_string(reason: &impl Display) -> String {
    serde_json::json!({ "error": reason.to_string() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1000));

        let result: Result<&str, RetriesExhausted<String>> = with_retry(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("boom {n}")) } else { Ok("done") }
            },
            &policy,
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_last_error_after_exactly_max_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1000));
        let started = Instant::now();

        let result: Result<(), _> = with_retry(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {n}"))
            },
            &policy,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last, "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two fixed waits, none after the last attempt
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_backoff_doubles_delay() {
        let policy = RetryPolicy::exponential(4, Duration::from_millis(100));
        let started = Instant::now();

        let result: Result<(), String> =
            with_backoff(|| async { Err::<(), _>("ECONNABORTED") }, &policy).await;

        // 100 + 200 + 400
        assert_eq!(started.elapsed(), Duration::from_millis(700));

        let shaped: serde_json::Value = serde_json::from_str(&result.unwrap_err()).unwrap();
        assert_eq!(shaped["error"], "ECONNABORTED");
    }

    #[test]
    fn delay_schedule() {
        let exp = RetryPolicy::exponential(5, Duration::from_millis(50));
        assert_eq!(exp.delay_after(1), Duration::from_millis(50));
        assert_eq!(exp.delay_after(3), Duration::from_millis(200));

        let fixed = RetryPolicy::fixed(5, Duration::from_millis(50));
        assert_eq!(fixed.delay_after(4), Duration::from_millis(50));
    }
}
