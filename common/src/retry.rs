use std::{fmt::Display, future::Future, time::Duration};

use owo_colors::OwoColorize;

/// Attempts a call makes before giving up.
pub const DEFAULT_RETRIES: u32 = 3;

/// Base delay between attempts; doubles after each failure.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Retries `f` up to `attempts` times with exponential backoff starting at
/// `base`. The last error is returned once the attempts are exhausted.
pub async fn retry<T, E, F, Fut>(attempts: u32, base: Duration, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts.max(1) {
                    return Err(e);
                }
                let delay = backoff_delay(base, attempt);
                eprintln!(
                    "{}{}{}{}{}{}",
                    "⚠️ Retrying after error: ".yellow(),
                    format!("{}", e).yellow().dimmed(),
                    " • attempt=".yellow(),
                    attempt.yellow().dimmed(),
                    " • delay=".yellow(),
                    format!("{:?}", delay).yellow().dimmed(),
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Delay before the attempt following failure number `attempt` (1-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(3, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err("boom".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err("still broken".to_string()) }
        })
        .await;
        assert_eq!(result, Err("still broken".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
