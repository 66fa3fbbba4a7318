//! Metrics rendered in the statsd line format

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static KEY_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-.]+").expect("valid regex"));
static UNIT_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").expect("valid regex"));
static TAG_KEY_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\-./]+").expect("valid regex"));

#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    Counter(f64),
    Distribution(Vec<f64>),
    Gauge {
        last: f64,
        min: f64,
        max: f64,
        sum: f64,
        count: u64,
    },
    Set(Vec<i64>),
}

impl MetricValue {
    pub fn gauge(value: f64) -> Self {
        Self::Gauge {
            last: value,
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    fn type_code(&self) -> &'static str {
        match self {
            Self::Counter(_) => "c",
            Self::Distribution(_) => "d",
            Self::Gauge { .. } => "g",
            Self::Set(_) => "s",
        }
    }

    fn values(&self) -> Vec<String> {
        match self {
            Self::Counter(sum) => vec![sum.to_string()],
            Self::Distribution(values) => values.iter().map(f64::to_string).collect(),
            Self::Gauge {
                last,
                min,
                max,
                sum,
                count,
            } => vec![
                last.to_string(),
                min.to_string(),
                max.to_string(),
                sum.to_string(),
                count.to_string(),
            ],
            Self::Set(members) => members.iter().map(i64::to_string).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub key: String,
    pub unit: String,
    pub value: MetricValue,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(key: impl Into<String>, value: MetricValue) -> Self {
        Self {
            key: key.into(),
            unit: "none".to_string(),
            value,
            tags: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Render as `key@unit:value[:value...]|type[|#tag:value,...]|Ttimestamp`
    pub fn to_statsd_line(&self) -> String {
        let mut line = format!(
            "{}@{}:{}|{}",
            KEY_SANITIZER.replace_all(&self.key, "_"),
            UNIT_SANITIZER.replace_all(&self.unit, ""),
            self.value.values().join(":"),
            self.value.type_code()
        );

        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}:{}",
                    TAG_KEY_SANITIZER.replace_all(key, ""),
                    escape_tag_value(value)
                )
            })
            .collect();
        if !tags.is_empty() {
            let _ = write!(line, "|#{}", tags.join(","));
        }

        let _ = write!(line, "|T{}", self.timestamp.timestamp());
        line
    }
}

fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\\' => escaped.push_str("\\\\"),
            '|' => escaped.push_str("\\u{7c}"),
            ',' => escaped.push_str("\\u{2c}"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_epoch(metric: Metric) -> Metric {
        Metric {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ..metric
        }
    }

    #[test]
    fn counter_line() {
        let metric = at_epoch(Metric::new("requests", MetricValue::Counter(3.0)));
        assert_eq!(metric.to_statsd_line(), "requests@none:3|c|T1700000000");
    }

    #[test]
    fn key_and_unit_are_sanitized() {
        let metric = at_epoch(
            Metric::new("http requests/total", MetricValue::Distribution(vec![1.5, 2.0]))
                .with_unit("milli second"),
        );
        assert_eq!(
            metric.to_statsd_line(),
            "http_requests_total@millisecond:1.5:2|d|T1700000000"
        );
    }

    #[test]
    fn tags_are_escaped() {
        let metric = at_epoch(
            Metric::new("jobs", MetricValue::gauge(4.0)).with_tag("queue name", "a|b,c"),
        );
        assert_eq!(
            metric.to_statsd_line(),
            "jobs@none:4:4:4:4:1|g|#queuename:a\\u{7c}b\\u{2c}c|T1700000000"
        );
    }
}
