//! Error classification and retry/circuit-breaker execution.
//!
//! Every fallible engine operation (remote fetch, persistence write) runs
//! through one [`RetryExecutor`]: classification decides retryability,
//! bounded backoff handles transient failures, and a per-operation-key
//! circuit breaker stops hammering an operation that keeps failing.
//!
//! All state lives in the executor instance; constructing two executors
//! gives two fully isolated sets of breakers.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::Result;

/// Failure taxonomy used for retry decisions and event error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientNetwork,
    RateLimited,
    Validation,
    NotFound,
    Persistence,
    Unknown,
}

impl ErrorKind {
    /// Stable string form used in event ledger error codes
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::RateLimited => "rate_limited",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Persistence => "persistence",
            Self::Unknown => "unknown",
        }
    }
}

/// How bad a classified failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// A classified failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub severity: Severity,
    pub retryable: bool,
}

/// Classify a crate error into the retry taxonomy.
#[must_use]
pub fn classify(error: &Error) -> ClassifiedError {
    let message = error.to_string();
    match error {
        // Connect/timeout failures are transient; anything else from the
        // transport layer is treated the same way
        Error::Http(_) => ClassifiedError {
            kind: ErrorKind::TransientNetwork,
            message,
            severity: Severity::Warning,
            retryable: true,
        },
        Error::RateLimited { .. } => ClassifiedError {
            kind: ErrorKind::RateLimited,
            message,
            severity: Severity::Warning,
            retryable: true,
        },
        Error::Validation(_) | Error::InvalidInput(_) => ClassifiedError {
            kind: ErrorKind::Validation,
            message,
            severity: Severity::Error,
            retryable: false,
        },
        Error::NotFound(_) => ClassifiedError {
            kind: ErrorKind::NotFound,
            message,
            severity: Severity::Error,
            retryable: false,
        },
        Error::Database(_) | Error::LibSql(_) | Error::Io(_) => ClassifiedError {
            kind: ErrorKind::Persistence,
            message,
            severity: Severity::Critical,
            retryable: true,
        },
        Error::RemoteApi(_) | Error::Serialization(_) | Error::Unsupported(_) | Error::Sync(_) => {
            ClassifiedError {
                kind: ErrorKind::Unknown,
                message,
                severity: Severity::Error,
                retryable: false,
            }
        }
    }
}

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial attempt)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0-1.0) to spread out retries
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt number (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        // Deterministic jitter based on attempt number
        let jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter_offset = (f64::from(attempt) * 0.618_033_988_749_895) % 1.0;
            jitter_range * (jitter_offset - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_secs_f64((capped_delay + jitter).max(0.0))
    }
}

/// Partial retry configuration for runtime tuning
#[derive(Debug, Clone, Default)]
pub struct RetryConfigPatch {
    pub max_attempts: Option<u32>,
    pub initial_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
    pub jitter_factor: Option<f64>,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit fails fast before half-opening
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Circuit state for one operation key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    total_failures: u64,
    total_opens: u64,
}

impl CircuitBreaker {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            total_failures: 0,
            total_opens: 0,
        }
    }

    /// Whether a call may proceed; open circuits half-open after cooldown
    fn allow(&mut self, config: &BreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map_or(Duration::MAX, |opened_at| opened_at.elapsed());
                if elapsed >= config.cooldown {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    fn on_failure(&mut self, config: &BreakerConfig) {
        self.total_failures += 1;
        self.consecutive_failures += 1;

        // A failed half-open probe reopens immediately
        if self.state == CircuitState::HalfOpen
            || self.consecutive_failures >= config.failure_threshold
        {
            if self.state != CircuitState::Open {
                self.total_opens += 1;
            }
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}

/// Observability snapshot for one circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerMetrics {
    pub key: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_opens: u64,
}

/// Terminal failure from [`RetryExecutor::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    /// Classification of the last observed error
    pub classified: ClassifiedError,
    /// How many times the operation was actually invoked
    pub attempts: u32,
    /// True when the circuit refused the call without invoking it
    pub circuit_open: bool,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.circuit_open {
            write!(
                f,
                "circuit open after {} attempts: {}",
                self.attempts, self.classified.message
            )
        } else {
            write!(
                f,
                "failed after {} attempts ({}): {}",
                self.attempts,
                self.classified.kind.as_str(),
                self.classified.message
            )
        }
    }
}

impl From<RetryFailure> for Error {
    fn from(failure: RetryFailure) -> Self {
        Self::Sync(failure.to_string())
    }
}

/// Retry + circuit-breaker decorator for fallible async operations.
pub struct RetryExecutor {
    retry_config: Mutex<RetryConfig>,
    breaker_config: BreakerConfig,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default(), BreakerConfig::default())
    }
}

impl RetryExecutor {
    /// Create an executor with the given retry and breaker configuration
    #[must_use]
    pub fn new(retry_config: RetryConfig, breaker_config: BreakerConfig) -> Self {
        Self {
            retry_config: Mutex::new(retry_config),
            breaker_config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` under retry and the circuit breaker for `operation_key`.
    ///
    /// Retries retryable failures with backoff up to the attempt ceiling.
    /// When the breaker for the key is open, fails fast without invoking
    /// `op`. The terminal error carries the last classification and the
    /// number of attempts made.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_key: &str,
        mut op: F,
    ) -> std::result::Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let config = self.retry_config.lock().await.clone();
        let mut attempts = 0u32;
        let mut last: Option<ClassifiedError> = None;

        loop {
            if !self.circuit_allows(operation_key).await {
                tracing::warn!(
                    operation = operation_key,
                    "circuit breaker open, skipping call"
                );
                return Err(RetryFailure {
                    classified: last.unwrap_or(ClassifiedError {
                        kind: ErrorKind::Unknown,
                        message: format!("circuit breaker open for '{operation_key}'"),
                        severity: Severity::Error,
                        retryable: false,
                    }),
                    attempts,
                    circuit_open: true,
                });
            }

            attempts += 1;
            match op().await {
                Ok(value) => {
                    self.record_success(operation_key).await;
                    return Ok(value);
                }
                Err(error) => {
                    let classified = classify(&error);
                    self.record_failure(operation_key).await;
                    tracing::warn!(
                        operation = operation_key,
                        attempt = attempts,
                        kind = classified.kind.as_str(),
                        error = %classified.message,
                        "operation failed"
                    );

                    let exhausted = attempts >= config.max_attempts;
                    if !classified.retryable || exhausted {
                        return Err(RetryFailure {
                            classified,
                            attempts,
                            circuit_open: false,
                        });
                    }

                    tokio::time::sleep(config.delay_for_attempt(attempts - 1)).await;
                    last = Some(classified);
                }
            }
        }
    }

    /// Snapshot all circuit breakers for observability
    pub async fn circuit_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        let breakers = self.breakers.lock().await;
        let mut metrics: Vec<CircuitBreakerMetrics> = breakers
            .iter()
            .map(|(key, breaker)| CircuitBreakerMetrics {
                key: key.clone(),
                state: breaker.state,
                consecutive_failures: breaker.consecutive_failures,
                total_failures: breaker.total_failures,
                total_opens: breaker.total_opens,
            })
            .collect();
        metrics.sort_by(|a, b| a.key.cmp(&b.key));
        metrics
    }

    /// Manually close the breaker for a key
    pub async fn reset_circuit(&self, operation_key: &str) {
        let mut breakers = self.breakers.lock().await;
        if let Some(breaker) = breakers.get_mut(operation_key) {
            breaker.on_success();
        }
    }

    /// Current retry configuration
    pub async fn config(&self) -> RetryConfig {
        self.retry_config.lock().await.clone()
    }

    /// Apply a partial configuration update at runtime
    pub async fn update_config(&self, patch: RetryConfigPatch) {
        let mut config = self.retry_config.lock().await;
        if let Some(max_attempts) = patch.max_attempts {
            config.max_attempts = max_attempts.max(1);
        }
        if let Some(initial_delay) = patch.initial_delay {
            config.initial_delay = initial_delay;
        }
        if let Some(max_delay) = patch.max_delay {
            config.max_delay = max_delay;
        }
        if let Some(backoff_multiplier) = patch.backoff_multiplier {
            config.backoff_multiplier = backoff_multiplier;
        }
        if let Some(jitter_factor) = patch.jitter_factor {
            config.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        }
    }

    async fn circuit_allows(&self, operation_key: &str) -> bool {
        let mut breakers = self.breakers.lock().await;
        breakers
            .entry(operation_key.to_string())
            .or_insert_with(CircuitBreaker::new)
            .allow(&self.breaker_config)
    }

    async fn record_success(&self, operation_key: &str) {
        let mut breakers = self.breakers.lock().await;
        if let Some(breaker) = breakers.get_mut(operation_key) {
            breaker.on_success();
        }
    }

    async fn record_failure(&self, operation_key: &str) {
        let mut breakers = self.breakers.lock().await;
        if let Some(breaker) = breakers.get_mut(operation_key) {
            breaker.on_failure(&self.breaker_config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn classify_maps_taxonomy() {
        let rate_limited = classify(&Error::RateLimited {
            retry_after_secs: 2,
        });
        assert_eq!(rate_limited.kind, ErrorKind::RateLimited);
        assert!(rate_limited.retryable);

        let not_found = classify(&Error::NotFound("vendor-1".to_string()));
        assert_eq!(not_found.kind, ErrorKind::NotFound);
        assert!(!not_found.retryable);

        let validation = classify(&Error::Validation("bad field".to_string()));
        assert_eq!(validation.kind, ErrorKind::Validation);
        assert!(!validation.retryable);

        let persistence = classify(&Error::Database("locked".to_string()));
        assert_eq!(persistence.kind, ErrorKind::Persistence);
        assert!(persistence.retryable);
        assert_eq!(persistence.severity, Severity::Critical);
    }

    #[test]
    fn delay_growth_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 10.0,
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(fast_retry(3), BreakerConfig::default());
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        let result = executor
            .execute("fetch", || async move {
                let attempt = calls_ref.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(Error::RateLimited {
                        retry_after_secs: 0,
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausts_after_max_attempts() {
        let executor = RetryExecutor::new(fast_retry(3), BreakerConfig::default());
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        let failure = executor
            .execute("fetch", || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Database("locked".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failure.classified.kind, ErrorKind::Persistence);
        assert!(!failure.circuit_open);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_retryable_fails_on_first_attempt() {
        let executor = RetryExecutor::new(fast_retry(5), BreakerConfig::default());
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        let failure = executor
            .execute("save", || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Validation("bad price".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn circuit_opens_and_fails_fast() {
        let breaker_config = BreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(60),
        };
        let executor = RetryExecutor::new(fast_retry(1), breaker_config);
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        for _ in 0..2 {
            let _ = executor
                .execute("fetch", || async move {
                    calls_ref.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::Database("down".to_string()))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Threshold reached: the next call must fail fast without invoking op
        let failure = executor
            .execute("fetch", || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(failure.circuit_open);
        assert_eq!(failure.attempts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Other keys are unaffected
        executor
            .execute("other", || async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn circuit_half_opens_after_cooldown() {
        let breaker_config = BreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(20),
        };
        let executor = RetryExecutor::new(fast_retry(1), breaker_config);

        let _ = executor
            .execute("fetch", || async {
                Err::<(), _>(Error::Database("down".to_string()))
            })
            .await;

        let metrics = executor.circuit_metrics().await;
        assert_eq!(metrics[0].state, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Cooldown elapsed: the probe goes through and closes the circuit
        executor
            .execute("fetch", || async { Ok(()) })
            .await
            .unwrap();

        let metrics = executor.circuit_metrics().await;
        assert_eq!(metrics[0].state, CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_circuit_closes_breaker() {
        let breaker_config = BreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(60),
        };
        let executor = RetryExecutor::new(fast_retry(1), breaker_config);

        let _ = executor
            .execute("fetch", || async {
                Err::<(), _>(Error::Database("down".to_string()))
            })
            .await;
        assert_eq!(executor.circuit_metrics().await[0].state, CircuitState::Open);

        executor.reset_circuit("fetch").await;
        assert_eq!(
            executor.circuit_metrics().await[0].state,
            CircuitState::Closed
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_config_applies_partial_patch() {
        let executor = RetryExecutor::default();
        executor
            .update_config(RetryConfigPatch {
                max_attempts: Some(7),
                jitter_factor: Some(2.0),
                ..Default::default()
            })
            .await;

        let config = executor.config().await;
        assert_eq!(config.max_attempts, 7);
        assert!((config.jitter_factor - 1.0).abs() < f64::EPSILON);
        // Untouched fields keep their defaults
        assert_eq!(config.initial_delay, Duration::from_millis(100));
    }
}
