//! Retry layer with exponential backoff.

use crate::command::{CommandOutcome, CommandRequest};
use crate::executor::CommandExecutor;
use fleetlink_core::Result;
use fleetlink_core::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_MAX_RETRIES,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Retry policy for device commands.
///
/// Whether an error is retried depends only on its kind; the policy decides
/// how often and how long to wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Re-attempts after the first call.
    pub max_retries: u32,
    /// Delay before the first re-attempt.
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy that never re-attempts.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before re-attempt number `attempt` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use fleetlink_pipeline::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(5000));
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_backoff_ms as f64);
        Duration::from_millis(delay.max(0.0) as u64)
    }
}

/// Re-attempts retryable failures of the wrapped executor.
///
/// Non-retryable errors propagate at once. When retries run out, or the
/// next backoff would cross the request deadline, the last error is returned
/// with its kind unchanged and `retry_count` set.
#[derive(Debug, Clone)]
pub struct RetryExecutor<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: CommandExecutor> RetryExecutor<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: CommandExecutor> CommandExecutor for RetryExecutor<E> {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        let mut retries = 0u32;

        loop {
            let error = match self.inner.execute(request).await {
                Ok(mut outcome) => {
                    outcome.retry_count = retries;
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error.with_retry_count(retries));
            }

            if retries >= self.policy.max_retries {
                warn!(
                    device_id = %request.device.id,
                    operation = request.operation(),
                    retries,
                    kind = %error.kind,
                    "Retries exhausted"
                );
                return Err(error.with_retry_count(retries));
            }

            let delay = self.policy.delay_for_attempt(retries + 1);
            if let Some(deadline) = request.deadline
                && Instant::now() + delay >= deadline
            {
                debug!(
                    device_id = %request.device.id,
                    operation = request.operation(),
                    retries,
                    "Deadline reached, not retrying"
                );
                return Err(error.with_retry_count(retries));
            }

            retries += 1;
            debug!(
                device_id = %request.device.id,
                operation = request.operation(),
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                kind = %error.kind,
                "Retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandOutput};
    use fleetlink_core::{Device, DeviceType, ErrorKind, ProtocolError};
    use rstest::rstest;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Executor failing with the scripted kinds, then succeeding.
    struct Scripted {
        failures: Mutex<VecDeque<ErrorKind>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(failures: &[ErrorKind]) -> Self {
            Self {
                failures: Mutex::new(failures.iter().copied().collect()),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl CommandExecutor for Scripted {
        async fn execute(&self, _request: &CommandRequest) -> Result<CommandOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.failures.lock().unwrap().pop_front();
            match next {
                Some(kind) => Err(ProtocolError::new(kind, "scripted")),
                None => Ok(CommandOutcome::new(CommandOutput::Persons(Vec::new()))),
            }
        }
    }

    fn request() -> CommandRequest {
        CommandRequest::new(
            Device::new("D1", DeviceType::Access, "ZKTECO"),
            Command::QueryPersons,
        )
    }

    #[rstest]
    #[case(1, 200)]
    #[case(2, 400)]
    #[case(3, 800)]
    #[case(5, 3200)]
    #[case(6, 5000)]
    #[case(40, 5000)]
    fn test_backoff_schedule(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(
            RetryPolicy::default().delay_for_attempt(attempt),
            Duration::from_millis(expected_ms)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retryable_failures() {
        let executor = RetryExecutor::new(
            Scripted::new(&[ErrorKind::DeviceBusy, ErrorKind::NetworkError]),
            RetryPolicy::default(),
        );

        let start = Instant::now();
        let outcome = executor.execute(&request()).await.unwrap();

        assert_eq!(outcome.retry_count, 2);
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_keeps_kind() {
        let executor = RetryExecutor::new(
            Scripted::new(&[ErrorKind::OperationTimeout; 10]),
            RetryPolicy::default(),
        );

        let err = executor.execute(&request()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::OperationTimeout);
        assert_eq!(err.retry_count, 3);
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[rstest]
    #[case(ErrorKind::AuthenticationFailed)]
    #[case(ErrorKind::DeviceFault)]
    #[case(ErrorKind::ValidationFailed)]
    #[case(ErrorKind::DeviceOffline)]
    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_is_not_retried(#[case] kind: ErrorKind) {
        let executor = RetryExecutor::new(Scripted::new(&[kind]), RetryPolicy::default());

        let start = Instant::now();
        let err = executor.execute(&request()).await.unwrap_err();

        assert_eq!(err.kind, kind);
        assert_eq!(err.retry_count, 0);
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retries() {
        let executor = RetryExecutor::new(
            Scripted::new(&[ErrorKind::TemporaryError; 10]),
            RetryPolicy::default(),
        );

        // 200ms + 400ms fit in 700ms, the 800ms backoff does not.
        let request = request().with_timeout(Duration::from_millis(700));
        let err = executor.execute(&request).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::TemporaryError);
        assert_eq!(err.retry_count, 2);
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_policy() {
        let executor =
            RetryExecutor::new(Scripted::new(&[ErrorKind::DeviceBusy]), RetryPolicy::none());
        let err = executor.execute(&request()).await.unwrap_err();
        assert_eq!(err.retry_count, 0);
    }

    #[test]
    fn test_policy_from_partial_config() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff_ms, 200);
    }
}
