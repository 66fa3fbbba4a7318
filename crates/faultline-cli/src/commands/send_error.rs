use clap::Args;
use faultline_core::{CapturedError, Scope};
use tracing::info;

use super::client_args::{parse_key_value, ClientArgs};

#[derive(Args)]
pub struct SendErrorCommand {
    /// Error message
    message: String,

    /// Type name reported for the error
    #[arg(long = "type", default_value = "cli::Error")]
    type_name: String,

    /// Cause of the error as type=message, outermost first (repeatable)
    #[arg(long = "cause", value_parser = parse_key_value)]
    causes: Vec<(String, String)>,

    /// Tag added to the event, as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_key_value)]
    tags: Vec<(String, String)>,

    #[command(flatten)]
    client: ClientArgs,
}

impl SendErrorCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let client = self.client.client()?;
            let error = build_error(&self.type_name, &self.message, &self.causes);

            let mut scope = Scope::new();
            for (key, value) in &self.tags {
                scope.set_tag(key.as_str(), value.as_str());
            }

            let event_id = client.capture_exception(error, Some(&scope), None).await;
            let flushed = client.flush(Some(self.client.flush_timeout())).await;

            match event_id {
                Some(event_id) => {
                    info!(%event_id, flushed, "Error sent");
                    println!("{event_id}");
                }
                None => info!(flushed, "The error was not sent"),
            }
            Ok(())
        })
    }
}

/// Chain `causes` behind the top level error, the first cause being its direct source
fn build_error(type_name: &str, message: &str, causes: &[(String, String)]) -> CapturedError {
    let innermost_first = causes
        .iter()
        .rev()
        .fold(None, |source: Option<CapturedError>, (ty, message)| {
            let cause = CapturedError::new(ty.as_str(), message.as_str());
            Some(match source {
                Some(source) => cause.with_source(source),
                None => cause,
            })
        });

    let error = CapturedError::new(type_name, message);
    match innermost_first {
        Some(source) => error.with_source(source),
        None => error,
    }
}
