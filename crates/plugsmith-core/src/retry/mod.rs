//! Policy-driven retry engine for outbound calls
//!
//! Every HTTP request issued by plugsmith goes through a [`RetryExecutor`]
//! configured from the `retry-policies` section of the runtime config. The
//! executor sleeps between attempts according to the policy's strategy and
//! stops early when the run's cancellation token fires.
//!
//! ```rust,no_run
//! use plugsmith_core::retry::{HttpStatusPredicate, RetryExecutorBuilder, TracingObserver};
//! use plugsmith_core::types::RetryPolicy;
//!
//! let executor = RetryExecutorBuilder::new()
//!     .with_policy(RetryPolicy::default())
//!     .with_predicate(HttpStatusPredicate::default_http())
//!     .with_observer(TracingObserver::new("upstream"))
//!     .build();
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{
    calculate_delay, AlwaysRetry, HttpStatusError, HttpStatusPredicate, NeverRetry, RetryPredicate,
};
