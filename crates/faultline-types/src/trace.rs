//! Distributed tracing primitives: ids, spans and the dynamic sampling context

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::{serialize_opt_timestamp, serialize_timestamp};

/// 128-bit trace identifier, 32 hex characters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_u128())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for TraceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 64-bit span identifier, 16 hex characters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_u64_pair().0)
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A timed operation inside a transaction
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub start_timestamp: DateTime<Utc>,
    #[serde(
        serialize_with = "serialize_opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl Span {
    pub fn new(trace_id: TraceId, parent_span_id: Option<SpanId>) -> Self {
        Self {
            trace_id,
            span_id: SpanId::new(),
            parent_span_id,
            op: None,
            description: None,
            status: None,
            start_timestamp: Utc::now(),
            timestamp: None,
            tags: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn finish(&mut self) {
        self.timestamp = Some(Utc::now());
    }

    /// The object stored under `contexts.trace`
    pub fn trace_context(&self) -> Value {
        let mut context = serde_json::json!({
            "trace_id": self.trace_id.to_string(),
            "span_id": self.span_id.to_string(),
        });
        if let Some(parent) = self.parent_span_id {
            context["parent_span_id"] = Value::String(parent.to_string());
        }
        if let Some(op) = &self.op {
            context["op"] = Value::String(op.clone());
        }
        if let Some(status) = &self.status {
            context["status"] = Value::String(status.clone());
        }
        context
    }
}

/// Trace-wide sampling decisions propagated to ingestion through the envelope header
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DynamicSamplingContext {
    entries: BTreeMap<String, String>,
}

impl DynamicSamplingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Parse the `sentry-` prefixed members of a W3C `baggage` header
    pub fn from_baggage(header: &str) -> Self {
        let mut dsc = Self::new();
        for member in header.split(',') {
            let Some((key, value)) = member.trim().split_once('=') else {
                continue;
            };
            if let Some(key) = key.trim().strip_prefix("sentry-") {
                dsc.set(key, value.trim());
            }
        }
        dsc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_fixed_width() {
        assert_eq!(TraceId::new().to_string().len(), 32);
        assert_eq!(SpanId::new().to_string().len(), 16);
        assert_eq!("00000000000000000000000000000001".parse::<TraceId>().unwrap().to_string(), "00000000000000000000000000000001");
    }

    #[test]
    fn baggage_keeps_only_prefixed_members() {
        let dsc = DynamicSamplingContext::from_baggage(
            "other=1, sentry-trace_id=abc,sentry-public_key=pk , sentry-sample_rate=0.5",
        );
        assert_eq!(dsc.get("trace_id"), Some("abc"));
        assert_eq!(dsc.get("public_key"), Some("pk"));
        assert_eq!(dsc.get("sample_rate"), Some("0.5"));
        assert_eq!(dsc.entries().len(), 3);
    }

    #[test]
    fn trace_context_includes_parent() {
        let trace_id = TraceId::new();
        let parent = SpanId::new();
        let mut span = Span::new(trace_id, Some(parent));
        span.op = Some("http.server".into());

        let context = span.trace_context();
        assert_eq!(context["trace_id"], trace_id.to_string());
        assert_eq!(context["parent_span_id"], parent.to_string());
        assert_eq!(context["op"], "http.server");
    }
}
