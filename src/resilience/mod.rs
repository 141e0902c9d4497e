//! # Resilience Module
//!
//! Retry handling for calls to external collaborators (worker processes, the result
//! store, the completion sink).
//!
//! Two retry classes exist:
//!
//! - **Bounded**: a fixed number of attempts with fixed backoff. Exhaustion becomes a
//!   terminal error at the call site, which must handle it explicitly.
//! - **Unbounded**: retried until success or cancellation. Used only where dropping the
//!   call would silently lose a final result.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_queue::resilience::{retry_with_policy, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::bounded(5, Duration::from_millis(200));
//! let value = retry_with_policy("fetch_value", &policy, None, || async {
//!     Ok::<_, std::io::Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{retry_with_policy, RetryError, RetryPolicy};
