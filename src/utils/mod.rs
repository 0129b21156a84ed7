//! Shared utility functions.
//!
//! - `text`: whitespace and NBSP normalization of scraped values
//! - `retry`: bounded retries with exponential backoff
//! - `urls`: path-segment and href helpers

#[cfg(test)]
pub(crate) mod log_capture;
mod retry;
mod text;
mod urls;

pub use retry::{with_retry, RetryPolicy};
pub use text::normalize_text;
pub use urls::{last_path_segment, resolve_href};
