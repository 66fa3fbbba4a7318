//! Connection flags shared by every command that sends events

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use faultline_core::{Client, NullTransport, Options, Transport};
use faultline_transport::HttpTransport;
use tracing::{debug, warn};

#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// DSN of the project events are sent to
    #[arg(long, env = "FAULTLINE_DSN")]
    pub dsn: Option<String>,

    /// Release the events belong to
    #[arg(long, env = "FAULTLINE_RELEASE")]
    pub release: Option<String>,

    /// Environment name (defaults to "production")
    #[arg(long, env = "FAULTLINE_ENVIRONMENT")]
    pub environment: Option<String>,

    #[arg(long, env = "FAULTLINE_SERVER_NAME")]
    pub server_name: Option<String>,

    /// Probability in [0, 1] that an error event is kept
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Send envelopes without gzip
    #[arg(long)]
    pub no_compression: bool,

    /// Seconds to wait for pending requests before exiting
    #[arg(long, default_value_t = 2)]
    pub flush_timeout: u64,
}

impl ClientArgs {
    pub fn options(&self) -> anyhow::Result<Options> {
        let mut builder = Options::builder()
            .from_env()
            .context("Invalid FAULTLINE_* environment")?
            .http_compression(!self.no_compression)
            .shutdown_timeout(self.flush_timeout());

        if let Some(dsn) = &self.dsn {
            builder = builder.dsn(dsn.as_str());
        }
        if let Some(release) = &self.release {
            builder = builder.release(release.as_str());
        }
        if let Some(environment) = &self.environment {
            builder = builder.environment(environment.as_str());
        }
        if let Some(server_name) = &self.server_name {
            builder = builder.server_name(server_name.as_str());
        }
        if let Some(sample_rate) = self.sample_rate {
            builder = builder.sample_rate(sample_rate);
        }

        Ok(builder.build()?)
    }

    /// Build a client sending over HTTP, or one that drops events when no DSN is set
    pub fn client(&self) -> anyhow::Result<Client> {
        let options = Arc::new(self.options()?);
        let transport: Arc<dyn Transport> = if options.dsn().is_some() {
            let transport = HttpTransport::new(&options)?;
            debug!(endpoint = transport.endpoint(), "Sending events over HTTP");
            Arc::new(transport)
        } else {
            warn!("No DSN configured, events will be dropped");
            Arc::new(NullTransport)
        };

        Ok(Client::builder(options).transport(transport).build()?)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout)
    }
}

/// Parse a `key=value` pair
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("region = eu"),
            Ok(("region".to_string(), "eu".to_string()))
        );
        assert_eq!(
            parse_key_value("url=a=b"),
            Ok(("url".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_flags_override_options() {
        let args = ClientArgs {
            dsn: Some("https://public@example.com/7".into()),
            release: Some("1.2.3".into()),
            sample_rate: Some(0.25),
            no_compression: true,
            ..ClientArgs::default()
        };

        let options = args.options().unwrap();
        assert_eq!(options.release(), Some("1.2.3"));
        assert_eq!(options.sample_rate(), 0.25);
        assert!(!options.http_compression());
        assert_eq!(options.dsn().unwrap().project_id(), 7);
    }

    #[test]
    fn test_invalid_sample_rate_is_rejected() {
        let args = ClientArgs {
            sample_rate: Some(1.5),
            ..ClientArgs::default()
        };
        assert!(args.options().is_err());
    }
}
