//! Bounded exponential backoff for idempotent hub reads.

use crate::error::HubError;
use log::{debug, error, warn};
use membase_rs_config::RetryConfig;
use std::future::Future;

/// Run `call` until it yields a value, a client error, or attempts run out.
///
/// `Ok(None)` is a null response and counts as a failed attempt. The delay
/// after attempt `n` is `base_delay * 2^(n-1)`; no delay follows the last one.
pub(crate) async fn retry_read<T, F, Fut>(
    operation: &str,
    policy: RetryConfig,
    mut call: F,
) -> Result<T, HubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, HubError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        match call().await {
            Ok(Some(value)) => {
                if attempt > 1 {
                    debug!("{operation} succeeded on attempt {attempt}/{attempts}");
                }
                return Ok(value);
            }
            Ok(None) => {
                warn!("{operation} returned null (attempt={attempt}/{attempts})");
                last = Some(HubError::EmptyResponse {
                    operation: operation.to_string(),
                });
            }
            Err(err) if !err.is_retryable() => {
                warn!("{operation} failed without retry (attempt={attempt}, error={err})");
                return Err(err);
            }
            Err(err) => {
                warn!("{operation} failed (attempt={attempt}/{attempts}, error={err})");
                last = Some(err);
            }
        }

        if attempt < attempts {
            let delay = policy.delay_after(attempt);
            debug!("{operation} retrying in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }

    let last = last.unwrap_or_else(|| HubError::EmptyResponse {
        operation: operation.to_string(),
    });
    error!("{operation} failed after {attempts} attempts: {last}");
    Err(HubError::RetryExhausted {
        operation: operation.to_string(),
        attempts,
        last: Box::new(last),
    })
}

#[cfg(test)]
mod tests {
    use super::retry_read;
    use crate::error::{HubError, TransportError};
    use membase_rs_config::RetryConfig;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures_with_growing_delays() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();
        let value = retry_read("listConversations", policy(3), move || async move {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(HubError::from(TransportError::Network("reset".into()))),
                1 => Ok(None),
                _ => Ok(Some(7)),
            }
        })
        .await
        .expect("value");
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_fail_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = retry_read::<(), _, _>("getConversation", policy(5), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(HubError::from_status("getConversation", 404))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, HubError::Client { status: 404, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_the_last_error() {
        let started = Instant::now();
        let err = retry_read::<(), _, _>("listConversations", policy(2), || async { Ok(None) })
            .await
            .unwrap_err();
        match err {
            HubError::RetryExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, HubError::EmptyResponse { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }
}
