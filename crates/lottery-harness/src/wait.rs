// Bounded polling for conditions that become true asynchronously

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Error, Debug)]
pub enum WaitError<E> {
    #[error("Timed out after {elapsed:?} waiting for {description}")]
    Timeout { description: String, elapsed: Duration },

    #[error(transparent)]
    Check(E),
}

#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Call `check` until it yields a value, fails, or `config.timeout` passes.
///
/// The check runs once immediately, then once per `poll_interval`. The last
/// attempt happens at or just before the deadline.
pub async fn poll_until<T, E, F, Fut>(
    description: &str,
    config: &WaitConfig,
    mut check: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;

    loop {
        if let Some(value) = check().await.map_err(WaitError::Check)? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                description: description.to_string(),
                elapsed: now - started,
            });
        }

        debug!("Still waiting for {}", description);
        tokio::time::sleep(config.poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(timeout_secs: u64, poll_secs: u64) -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_secs(poll_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_once_condition_holds() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let value = poll_until("third attempt", &config(60, 5), || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            Ok::<_, String>((n == 3).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_explicit_error() {
        let started = Instant::now();
        let result: Result<(), _> = poll_until("never", &config(180, 5), || async { Ok::<_, String>(None) }).await;

        match result {
            Err(WaitError::Timeout { description, elapsed }) => {
                assert_eq!(description, "never");
                assert!(elapsed >= Duration::from_secs(180));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(186));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_stops_polling() {
        let result: Result<(), _> =
            poll_until("failing", &config(60, 1), || async { Err::<Option<()>, _>("node down".to_string()) }).await;

        assert!(matches!(result, Err(WaitError::Check(msg)) if msg == "node down"));
    }
}
