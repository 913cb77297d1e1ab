//! Error returned by the retry executor

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Why a retried operation ultimately failed
#[derive(Debug)]
pub enum RetryError<E> {
    /// All attempts failed with retryable errors
    Exhausted {
        attempts: u32,
        source: E,
        total_duration: Duration,
    },

    /// The cancellation token fired before the operation completed
    Cancelled {
        attempts: u32,
        last_error: Option<E>,
    },

    /// The predicate rejected the error as permanent
    NonRetryable(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "retry exhausted after {} attempts over {:.2}s: {}",
                attempts,
                total_duration.as_secs_f64(),
                source
            ),
            RetryError::Cancelled {
                attempts,
                last_error: Some(err),
            } => write!(f, "retry cancelled after {} attempts: {}", attempts, err),
            RetryError::Cancelled { attempts, .. } => {
                write!(f, "retry cancelled after {} attempts", attempts)
            }
            RetryError::NonRetryable(source) => write!(f, "non-retryable error: {}", source),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled {
                last_error: Some(err),
                ..
            } => Some(err),
            RetryError::NonRetryable(source) => Some(source),
            RetryError::Cancelled { .. } => None,
        }
    }
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Cancelled { attempts, .. } => *attempts,
            RetryError::NonRetryable(_) => 1,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Underlying error from the last attempt, if any
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error,
            RetryError::NonRetryable(source) => Some(source),
        }
    }
}
