//! Shared Utilities

pub mod retry;

pub use retry::{with_retry, RetryPolicy, Transient};
