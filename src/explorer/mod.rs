//! Upstream block-explorer access.
//!
//! - [`client`]: HTTP client and response classification
//! - [`endpoint`]: gateway rotation
//! - [`retry`]: backoff and jitter
//! - [`types`]: wire format and normalized logs

pub mod client;
pub mod endpoint;
pub mod retry;
pub mod types;

pub use client::{
    classify_response, ApiOutcome, ClientSettings, ExplorerClient, LogSource, RequestPacing,
};
pub use endpoint::EndpointSelector;
pub use retry::{with_retry, RetryPolicy};
pub use types::{parse_quantity, ExplorerLog, RawLog};
