use serde::Serialize;

use crate::EventId;

/// Outcome reported by a cron monitor check-in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    Ok,
    Error,
    InProgress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorScheduleUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MonitorSchedule {
    Crontab { value: String },
    Interval { value: u32, unit: MonitorScheduleUnit },
}

/// Upsert configuration sent along with a check-in
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonitorConfig {
    pub schedule: MonitorSchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkin_margin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_runtime: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl MonitorConfig {
    pub fn new(schedule: MonitorSchedule) -> Self {
        Self {
            schedule,
            checkin_margin: None,
            max_runtime: None,
            timezone: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckIn {
    /// Reuse the id of an `InProgress` check-in to close it
    pub id: EventId,
    pub monitor_slug: String,
    pub status: CheckInStatus,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub release: Option<String>,
    pub environment: Option<String>,
    pub monitor_config: Option<MonitorConfig>,
}

impl CheckIn {
    pub fn new(monitor_slug: impl Into<String>, status: CheckInStatus) -> Self {
        Self {
            id: EventId::new(),
            monitor_slug: monitor_slug.into(),
            status,
            duration: None,
            release: None,
            environment: None,
            monitor_config: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_tagged_by_type() {
        let crontab = serde_json::to_value(MonitorSchedule::Crontab {
            value: "0 * * * *".into(),
        })
        .unwrap();
        assert_eq!(crontab, serde_json::json!({"type": "crontab", "value": "0 * * * *"}));

        let interval = serde_json::to_value(MonitorSchedule::Interval {
            value: 10,
            unit: MonitorScheduleUnit::Minute,
        })
        .unwrap();
        assert_eq!(
            interval,
            serde_json::json!({"type": "interval", "value": 10, "unit": "minute"})
        );
    }

    #[test]
    fn status_uses_snake_case() {
        assert_eq!(
            serde_json::to_value(CheckInStatus::InProgress).unwrap(),
            "in_progress"
        );
    }
}
