//! HTTP delivery of Faultline envelopes
//!
//! [`HttpTransport`] renders each event with the envelope serializer, posts it to the
//! DSN's envelope endpoint and keeps track of the rate limits the endpoint announces.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use faultline_core::{Client, Options};
//! use faultline_transport::HttpTransport;
//!
//! let options = Arc::new(Options::builder().dsn("https://public@example.com/1").build()?);
//! let client = Client::builder(options.clone())
//!     .transport(Arc::new(HttpTransport::new(&options)?))
//!     .build()?;
//! client.capture_message("hello", None, None, None).await;
//! client.flush(None).await;
//! # Ok(())
//! # }
//! ```

mod error;
mod http;
pub mod rate_limit;

pub use error::HttpTransportError;
pub use http::{HttpTransport, ENVELOPE_CONTENT_TYPE};
pub use rate_limit::RateLimiter;
