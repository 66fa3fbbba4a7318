//! The event: a single reportable occurrence

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    Breadcrumb, CheckIn, DynamicSamplingContext, ExceptionDataBag, Metric, Profile, Span,
    Stacktrace, UserDataBag, SDK_IDENTIFIER, SDK_VERSION,
};

/// Unique identifier of an event, rendered as 32 lowercase hex characters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Severity of an event or breadcrumb
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// The kind of an event. Fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    Transaction,
    CheckIn,
    Metrics,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Transaction => "transaction",
            Self::CheckIn => "check_in",
            Self::Metrics => "metrics",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Objects attached to an event for envelope rendering, never part of the event payload
#[derive(Clone, Debug, Default)]
pub struct SdkMetadata {
    /// Rendered into the envelope header as `trace`
    pub dynamic_sampling_context: Option<DynamicSamplingContext>,
    /// Rendered as an extra `profile` item after a transaction
    pub profile: Option<Profile>,
}

/// A single reportable occurrence: an error, a transaction, a cron check-in or a batch
/// of metrics.
///
/// The identifier and the kind are fixed at construction; every other field is free
/// to be filled by the capture pipeline, the scope and user callbacks.
#[derive(Clone, Debug)]
pub struct Event {
    id: EventId,
    kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub level: Option<Level>,
    pub logger: Option<String>,
    pub transaction: Option<String>,
    pub server_name: Option<String>,
    pub release: Option<String>,
    pub environment: Option<String>,
    pub dist: Option<String>,
    pub message: Option<String>,
    pub message_params: Vec<String>,
    pub message_formatted: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub extra: BTreeMap<String, Value>,
    pub contexts: BTreeMap<String, Value>,
    pub user: Option<UserDataBag>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub fingerprint: Vec<String>,
    /// Exceptions in capture traversal order: the outermost error first, followed by
    /// each of its causes.
    pub exceptions: Vec<ExceptionDataBag>,
    pub stacktrace: Option<Stacktrace>,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub spans: Vec<Span>,
    pub check_in: Option<CheckIn>,
    pub metrics: Vec<Metric>,
    pub sdk_identifier: String,
    pub sdk_version: String,
    pub sdk_metadata: SdkMetadata,
}

impl Event {
    /// Create an event of the given kind with a fresh identifier
    pub fn new(kind: EventKind) -> Self {
        Self::with_id(EventId::new(), kind)
    }

    pub fn with_id(id: EventId, kind: EventKind) -> Self {
        Self {
            id,
            kind,
            timestamp: Utc::now(),
            level: None,
            logger: None,
            transaction: None,
            server_name: None,
            release: None,
            environment: None,
            dist: None,
            message: None,
            message_params: Vec::new(),
            message_formatted: None,
            tags: BTreeMap::new(),
            extra: BTreeMap::new(),
            contexts: BTreeMap::new(),
            user: None,
            breadcrumbs: Vec::new(),
            fingerprint: Vec::new(),
            exceptions: Vec::new(),
            stacktrace: None,
            start_timestamp: None,
            spans: Vec::new(),
            check_in: None,
            metrics: Vec::new(),
            sdk_identifier: SDK_IDENTIFIER.to_string(),
            sdk_version: SDK_VERSION.to_string(),
            sdk_metadata: SdkMetadata::default(),
        }
    }

    pub fn error() -> Self {
        Self::new(EventKind::Error)
    }

    pub fn transaction(name: impl Into<String>) -> Self {
        let mut event = Self::new(EventKind::Transaction);
        event.transaction = Some(name.into());
        event.start_timestamp = Some(event.timestamp);
        event
    }

    pub fn check_in(check_in: CheckIn) -> Self {
        let mut event = Self::new(EventKind::CheckIn);
        event.check_in = Some(check_in);
        event
    }

    pub fn metrics(metrics: Vec<Metric>) -> Self {
        let mut event = Self::new(EventKind::Metrics);
        event.metrics = metrics;
        event
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn set_message(&mut self, message: impl Into<String>, params: Vec<String>) {
        self.message = Some(message.into());
        self.message_params = params;
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn set_context(&mut self, name: impl Into<String>, value: Value) {
        self.contexts.insert(name.into(), value);
    }

    /// The `trace_id` of the `trace` context, if one was attached
    pub fn trace_id(&self) -> Option<&str> {
        self.contexts
            .get("trace")
            .and_then(|trace| trace.get("trace_id"))
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_renders_without_dashes() {
        let id: EventId = "fc9442f5-aef3-4f0a-9b11-4ee1a1d6b7a8".parse().unwrap();
        assert_eq!(id.to_string(), "fc9442f5aef34f0a9b114ee1a1d6b7a8");

        let reparsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(reparsed, id);
    }

    #[test]
    fn constructors_fix_the_kind() {
        assert_eq!(Event::error().kind(), EventKind::Error);

        let tx = Event::transaction("GET /health");
        assert_eq!(tx.kind(), EventKind::Transaction);
        assert_eq!(tx.transaction.as_deref(), Some("GET /health"));
        assert_eq!(tx.start_timestamp, Some(tx.timestamp));

        assert_eq!(Event::metrics(Vec::new()).kind(), EventKind::Metrics);
    }

    #[test]
    fn new_events_carry_sdk_identity() {
        let event = Event::error();
        assert_eq!(event.sdk_identifier, SDK_IDENTIFIER);
        assert_eq!(event.sdk_version, SDK_VERSION);
        assert!(event.level.is_none());
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Fatal);
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn trace_id_reads_trace_context() {
        let mut event = Event::error();
        assert!(event.trace_id().is_none());
        event.set_context("trace", serde_json::json!({"trace_id": "abc", "span_id": "def"}));
        assert_eq!(event.trace_id(), Some("abc"));
    }
}
