//! The seam between the capture pipeline and the network

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use faultline_types::{Event, SerializeError};
use thiserror::Error;

/// Outcome of handing an event to a transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    Success,
    Failed,
    Invalid,
    RateLimit,
    Skipped,
    Unknown,
}

impl ResultStatus {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            429 => Self::RateLimit,
            400..=499 => Self::Invalid,
            500..=599 => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Invalid => "invalid",
            Self::RateLimit => "rate_limit",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TransportResult {
    pub status: ResultStatus,
    /// The event as it was sent, when the transport keeps it
    pub event: Option<Event>,
}

impl TransportResult {
    pub fn new(status: ResultStatus, event: Option<Event>) -> Self {
        Self { status, event }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] SerializeError),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Transport is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Delivers events to an ingestion backend
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, event: Event) -> Result<TransportResult, TransportError>;

    /// Wait for in-flight sends; `Ok(false)` when `timeout` elapsed first
    async fn close(&self, timeout: Option<Duration>) -> Result<bool, TransportError>;
}

/// Transport used when no DSN is configured: every event is skipped
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, event: Event) -> Result<TransportResult, TransportError> {
        Ok(TransportResult::new(ResultStatus::Skipped, Some(event)))
    }

    async fn close(&self, _timeout: Option<Duration>) -> Result<bool, TransportError> {
        Ok(true)
    }
}
