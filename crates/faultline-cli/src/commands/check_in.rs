use clap::{Args, ValueEnum};
use faultline_core::types::{CheckIn, CheckInStatus, EventId, MonitorConfig, MonitorSchedule};
use tracing::info;

use super::client_args::ClientArgs;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Status {
    Ok,
    Error,
    InProgress,
}

impl From<Status> for CheckInStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => CheckInStatus::Ok,
            Status::Error => CheckInStatus::Error,
            Status::InProgress => CheckInStatus::InProgress,
        }
    }
}

#[derive(Args)]
pub struct CheckInCommand {
    /// Slug of the monitor
    slug: String,

    #[arg(long, value_enum, default_value = "ok")]
    status: Status,

    /// Run time of the job in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Id of an in-progress check-in to close
    #[arg(long)]
    id: Option<EventId>,

    /// Crontab schedule, creates or updates the monitor
    #[arg(long)]
    crontab: Option<String>,

    /// Minutes after the expected time a check-in is still accepted
    #[arg(long, requires = "crontab")]
    margin: Option<u32>,

    /// Minutes an in-progress check-in may run before it is marked failed
    #[arg(long, requires = "crontab")]
    max_runtime: Option<u32>,

    #[arg(long, requires = "crontab")]
    timezone: Option<String>,

    #[command(flatten)]
    client: ClientArgs,
}

impl CheckInCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let client = self.client.client()?;
            let check_in = self.check_in();
            let slug = check_in.monitor_slug.clone();

            let check_in_id = client.capture_check_in(check_in, None).await;
            let flushed = client.flush(Some(self.client.flush_timeout())).await;

            match check_in_id {
                Some(check_in_id) => {
                    info!(%check_in_id, monitor = %slug, flushed, "Check-in sent");
                    println!("{check_in_id}");
                }
                None => info!(monitor = %slug, flushed, "The check-in was not sent"),
            }
            Ok(())
        })
    }

    fn check_in(&self) -> CheckIn {
        let mut check_in = CheckIn::new(self.slug.as_str(), self.status.into());
        if let Some(id) = self.id {
            check_in.id = id;
        }
        check_in.duration = self.duration;
        check_in.monitor_config = self.crontab.as_ref().map(|crontab| MonitorConfig {
            checkin_margin: self.margin,
            max_runtime: self.max_runtime,
            timezone: self.timezone.clone(),
            ..MonitorConfig::new(MonitorSchedule::Crontab {
                value: crontab.clone(),
            })
        });
        check_in
    }
}
