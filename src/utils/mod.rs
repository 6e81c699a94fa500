//! Utility modules supporting enrichment.
//!
//! - [`with_retry`]: Execute a lookup with automatic retry on transient errors
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`HttpClient`]: Shared HTTP client with sensible defaults
//! - [`RateLimiter`]: Client-side request pacing
//! - [`RowSelection`]: Parsing of `2:10,12,15:` style row selections
//! - [`ProgressReporter`]: Progress bar for long batches
//!
//! # Retry
//!
//! ```rust,no_run
//! use paper_enrich::utils::{with_retry, RetryConfig};
//! use paper_enrich::lookup::LookupError;
//!
//! # async fn example() -> Result<(), LookupError> {
//! let value = with_retry(RetryConfig::default(), || async {
//!     Ok::<_, LookupError>(42)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

mod http;
mod progress;
mod range;
mod rate_limit;
mod retry;

pub use http::{check_response, encode_doi, map_send_error, HttpClient};
pub use progress::ProgressReporter;
pub use range::{row_number, RangeError, ResolvedRows, RowSelection, FIRST_DATA_ROW};
pub use rate_limit::RateLimiter;
pub use retry::{with_retry, RetryConfig, TransientError};
