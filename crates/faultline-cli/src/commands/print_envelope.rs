use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use faultline_core::types::PayloadSerializer;
use faultline_core::{
    Client, Event, Level, ResultStatus, Scope, Transport, TransportError, TransportResult,
};

use super::client_args::{parse_key_value, ClientArgs};

#[derive(Args)]
pub struct PrintEnvelopeCommand {
    /// Message text
    message: String,

    #[arg(long)]
    level: Option<Level>,

    /// Tag added to the event, as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_key_value)]
    tags: Vec<(String, String)>,

    #[command(flatten)]
    client: ClientArgs,
}

/// Keeps serialized envelopes in memory instead of sending them
#[derive(Debug, Default)]
struct CollectingTransport {
    serializer: PayloadSerializer,
    envelopes: Mutex<Vec<String>>,
}

impl CollectingTransport {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.envelopes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Transport for CollectingTransport {
    async fn send(&self, event: Event) -> Result<TransportResult, TransportError> {
        let envelope = self.serializer.serialize(&event)?;
        self.envelopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
        Ok(TransportResult::new(ResultStatus::Success, Some(event)))
    }

    async fn close(&self, _timeout: Option<Duration>) -> Result<bool, TransportError> {
        Ok(true)
    }
}

impl PrintEnvelopeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            for envelope in self.render().await? {
                println!("{envelope}");
            }
            Ok(())
        })
    }

    async fn render(&self) -> anyhow::Result<Vec<String>> {
        let options = Arc::new(self.client.options()?);
        let transport = Arc::new(CollectingTransport {
            serializer: PayloadSerializer::new(options.dsn().cloned()),
            envelopes: Mutex::new(Vec::new()),
        });
        let client = Client::builder(options)
            .transport(transport.clone())
            .build()?;

        let mut scope = Scope::new();
        for (key, value) in &self.tags {
            scope.set_tag(key.as_str(), value.as_str());
        }
        client
            .capture_message(self.message.as_str(), self.level, Some(&scope), None)
            .await;

        Ok(transport.take())
    }
}
