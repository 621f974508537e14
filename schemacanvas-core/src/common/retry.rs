use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::SchemaResult;

/// How often a unit of work is re-run after a transient store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(20))
    }
}

/// Run `attempt` until it succeeds, fails with a non-transient error, or the
/// policy is exhausted. Each attempt must open its own transaction so that it
/// re-reads fresh state.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> SchemaResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SchemaResult<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err) if err.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    "Transient store failure during {} (retry {}/{}): {}",
                    operation, retries, policy.max_retries, err
                );
                tokio::time::sleep(policy.backoff * retries).await;
            }
            Err(err) => return Err(err.with_operation(operation)),
            Ok(value) => return Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SchemaError;
    use sea_orm::{DbErr, RuntimeErr};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn busy() -> SchemaError {
        DbErr::Exec(RuntimeErr::Internal("database is locked".to_string())).into()
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result = with_retry(&policy, "push entry", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(busy())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.expect("should succeed after retries"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_policy_is_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(1, Duration::ZERO);

        let result: SchemaResult<()> = with_retry(&policy, "push entry", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(busy())
        })
        .await;

        match result {
            Err(SchemaError::StoreFailure { operation, .. }) => assert_eq!(operation, "push entry"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_domain_errors_fail_fast() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();
        let result: SchemaResult<()> = with_retry(&policy, "delete column", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SchemaError::invalid("bad input"))
        })
        .await;

        assert!(matches!(result, Err(SchemaError::InvalidArgument(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
