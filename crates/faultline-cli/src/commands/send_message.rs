use clap::Args;
use faultline_core::{Level, Scope};
use tracing::info;

use super::client_args::{parse_key_value, ClientArgs};

#[derive(Args)]
pub struct SendMessageCommand {
    /// Message text
    message: String,

    /// Event level (debug, info, warning, error, fatal)
    #[arg(long)]
    level: Option<Level>,

    /// Tag added to the event, as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_key_value)]
    tags: Vec<(String, String)>,

    #[command(flatten)]
    client: ClientArgs,
}

impl SendMessageCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let client = self.client.client()?;

            let mut scope = Scope::new();
            for (key, value) in &self.tags {
                scope.set_tag(key.as_str(), value.as_str());
            }

            let event_id = client
                .capture_message(self.message.as_str(), self.level, Some(&scope), None)
                .await;
            let flushed = client.flush(Some(self.client.flush_timeout())).await;

            match event_id {
                Some(event_id) => {
                    info!(%event_id, flushed, "Message sent");
                    println!("{event_id}");
                }
                None => info!(flushed, "The message was not sent"),
            }
            Ok(())
        })
    }
}
