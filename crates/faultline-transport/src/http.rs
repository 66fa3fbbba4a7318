use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use faultline_core::{Options, ResultStatus, Transport, TransportError, TransportResult};
use faultline_types::{Event, PayloadSerializer, SDK_IDENTIFIER, SDK_VERSION};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE, RETRY_AFTER};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::HttpTransportError;
use crate::rate_limit::RateLimiter;

pub const ENVELOPE_CONTENT_TYPE: &str = "application/x-sentry-envelope";
const AUTH_HEADER: &str = "X-Sentry-Auth";
const RATE_LIMITS_HEADER: &str = "X-Sentry-Rate-Limits";

/// Posts envelopes to the envelope endpoint of the configured DSN
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
    auth_header: String,
    serializer: PayloadSerializer,
    compression: bool,
    rate_limiter: RateLimiter,
    in_flight: Arc<InFlight>,
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    drained: Notify,
}

/// Counts one request as in flight until dropped
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

impl HttpTransport {
    pub fn new(options: &Options) -> Result<Self, HttpTransportError> {
        let dsn = options.dsn().ok_or(HttpTransportError::MissingDsn)?;
        let client_name = format!("{SDK_IDENTIFIER}/{SDK_VERSION}");

        let http_client = reqwest::Client::builder()
            .timeout(options.http_timeout())
            .user_agent(client_name.as_str())
            .build()?;

        Ok(Self {
            http_client,
            endpoint: dsn.envelope_api_endpoint_url(),
            auth_header: dsn.auth_header(&client_name),
            serializer: PayloadSerializer::new(Some(dsn.clone())),
            compression: options.http_compression(),
            rate_limiter: RateLimiter::new(),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of requests currently being sent
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    fn compress(payload: &str) -> Result<Vec<u8>, TransportError> {
        let compression_error =
            |e: std::io::Error| TransportError::Other(format!("Failed to compress envelope: {e}"));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(payload.as_bytes())
            .map_err(compression_error)?;
        encoder.finish().map_err(compression_error)
    }

    async fn wait_until_drained(&self) {
        loop {
            let notified = self.in_flight.drained.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, event: Event) -> Result<TransportResult, TransportError> {
        if self.rate_limiter.is_limited(event.kind()) {
            debug!(
                event_id = %event.id(),
                kind = %event.kind(),
                "Rate limit active, the event is not sent"
            );
            return Ok(TransportResult::new(ResultStatus::RateLimit, Some(event)));
        }

        let payload = self.serializer.serialize(&event)?;
        let _guard = InFlightGuard::new(&self.in_flight);

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header(AUTH_HEADER, &self.auth_header)
            .header(CONTENT_TYPE, ENVELOPE_CONTENT_TYPE);
        request = if self.compression {
            request
                .header(CONTENT_ENCODING, "gzip")
                .body(Self::compress(&payload)?)
        } else {
            request.body(payload)
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers();
        self.rate_limiter.update(
            status,
            header_value(headers, RATE_LIMITS_HEADER),
            header_value(headers, RETRY_AFTER.as_str()),
        );

        let result_status = ResultStatus::from_http_status(status);
        if result_status != ResultStatus::Success {
            warn!(
                event_id = %event.id(),
                status,
                "The ingestion endpoint did not accept the event"
            );
        }

        Ok(TransportResult::new(result_status, Some(event)))
    }

    async fn close(&self, timeout: Option<Duration>) -> Result<bool, TransportError> {
        match timeout {
            Some(timeout) => Ok(tokio::time::timeout(timeout, self.wait_until_drained())
                .await
                .is_ok()),
            None => {
                self.wait_until_drained().await;
                Ok(true)
            }
        }
    }
}
