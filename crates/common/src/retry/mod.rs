//! Bounded exponential-backoff retry
//!
//! One policy object drives every retried remote call:
//! - a retryable predicate splits failures into transient and fatal
//! - the delay doubles from `initial_delay` up to `max_delay`
//! - an optional callback is told about each retry before the sleep

use crate::errors::{AppError, ErrorCategory, Result};
use crate::metrics;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default number of attempts (first call included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Default upper bound on a single delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

type RetryPredicate = Arc<dyn Fn(&AppError) -> bool + Send + Sync>;
type RetryCallback = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// A retry that is about to happen
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// Attempt that just failed (1-based)
    pub attempt: u32,
    pub max_attempts: u32,
    /// Sleep before the next attempt
    pub delay: Duration,
    pub category: ErrorCategory,
    pub error: String,
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attempt {}/{} failed ({:?}). Retrying in {:.1}s...",
            self.attempt,
            self.max_attempts,
            self.category,
            self.delay.as_secs_f64()
        )
    }
}

/// Retry policy with transient/fatal split and optional progress callback
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    retryable: RetryPredicate,
    on_retry: Option<RetryCallback>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Policy retrying the transient categories with a doubling delay
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
            retryable: Arc::new(AppError::is_transient),
            on_retry: None,
        }
    }

    /// Retry only errors whose category is in `categories`
    pub fn retry_on(mut self, categories: &[ErrorCategory]) -> Self {
        let categories = categories.to_vec();
        self.retryable = Arc::new(move |err: &AppError| categories.contains(&err.category()));
        self
    }

    /// Retry errors accepted by an arbitrary predicate
    pub fn retry_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&AppError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    /// Get notified before every backoff sleep
    pub fn on_retry<C>(mut self, callback: C) -> Self
    where
        C: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn is_retryable(&self, err: &AppError) -> bool {
        (self.retryable)(err)
    }

    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(self.backoff_multiplier)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `operation` until it succeeds, fails fatally, or runs out of attempts.
    ///
    /// Fatal errors propagate immediately without sleeping. After
    /// `max_attempts` transient failures the last error is returned.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut schedule = self.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.is_retryable(&err) {
                warn!(
                    operation = operation_name,
                    attempt,
                    category = ?err.category(),
                    error = %err,
                    "Non-retryable error"
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(
                    operation = operation_name,
                    attempts = attempt,
                    category = ?err.category(),
                    error = %err,
                    "Giving up after maximum attempts"
                );
                return Err(err);
            }

            let delay = schedule
                .next_backoff()
                .unwrap_or(self.max_delay)
                .min(self.max_delay);

            let event = RetryEvent {
                attempt,
                max_attempts,
                delay,
                category: err.category(),
                error: err.to_string(),
            };

            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient error, retrying"
            );
            metrics::record_retry(operation_name);

            if let Some(callback) = &self.on_retry {
                callback(&event);
            }

            tokio::time::sleep(delay).await;
        }
    }
}
