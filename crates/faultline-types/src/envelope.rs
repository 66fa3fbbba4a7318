//! Envelope serialization
//!
//! The envelope format is a simple newline-delimited protocol:
//! ```text
//! {envelope_header}\n
//! {item_header}\n
//! {item_payload}\n
//! {item_header}\n
//! {item_payload}
//! ```
//!
//! Every event renders into exactly one envelope. The item written depends on the
//! event kind; transactions may be followed by a `profile` item.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::payload::{check_in_payload, event_payload, statsd_payload};
use crate::utils::format_sent_at;
use crate::{Dsn, Event, EventKind};

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("check-in event {0} carries no check-in")]
    MissingCheckIn(crate::EventId),
}

/// The type of an envelope item
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Event payload encoded in JSON.
    Event,
    /// Transaction event payload encoded in JSON.
    Transaction,
    /// Profile event payload encoded as JSON.
    Profile,
    /// Monitor check-in encoded as JSON.
    CheckIn,
    /// Individual metrics in text encoding.
    Statsd,
}

impl ItemType {
    /// Returns the variant name of the item type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Transaction => "transaction",
            Self::Profile => "profile",
            Self::CheckIn => "check_in",
            Self::Statsd => "statsd",
        }
    }

    /// The item type carrying the main payload of an event of the given kind
    pub fn for_event_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::Error => Self::Event,
            EventKind::Transaction => Self::Transaction,
            EventKind::CheckIn => Self::CheckIn,
            EventKind::Metrics => Self::Statsd,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize)]
struct ItemHeader {
    #[serde(rename = "type")]
    ty: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
}

impl ItemHeader {
    fn json(ty: ItemType) -> Self {
        Self {
            ty,
            content_type: Some("application/json"),
            length: None,
        }
    }
}

fn json_item(ty: ItemType, payload: &Value) -> Result<String, SerializeError> {
    Ok(format!(
        "{}\n{}",
        serde_json::to_string(&ItemHeader::json(ty))?,
        serde_json::to_string(payload)?
    ))
}

/// Renders events into envelopes addressed to a DSN
#[derive(Debug, Clone, Default)]
pub struct PayloadSerializer {
    dsn: Option<Dsn>,
}

impl PayloadSerializer {
    pub fn new(dsn: Option<Dsn>) -> Self {
        Self { dsn }
    }

    /// Serialize an event, stamping `sent_at` with the current time
    pub fn serialize(&self, event: &Event) -> Result<String, SerializeError> {
        self.serialize_at(event, Utc::now())
    }

    /// Serialize an event with an explicit `sent_at`
    pub fn serialize_at(
        &self,
        event: &Event,
        sent_at: DateTime<Utc>,
    ) -> Result<String, SerializeError> {
        let header = self.envelope_header(event, sent_at);
        let mut parts = vec![serde_json::to_string(&header)?];

        match event.kind() {
            EventKind::Error => {
                parts.push(json_item(ItemType::Event, &event_payload(event)?)?);
            }
            EventKind::Transaction => {
                parts.push(json_item(ItemType::Transaction, &event_payload(event)?)?);
                let profile = event
                    .sdk_metadata
                    .profile
                    .as_ref()
                    .and_then(|profile| profile.formatted_data(event));
                if let Some(profile) = profile {
                    parts.push(json_item(ItemType::Profile, &profile)?);
                }
            }
            EventKind::CheckIn => {
                let payload =
                    check_in_payload(event).ok_or(SerializeError::MissingCheckIn(event.id()))?;
                parts.push(json_item(ItemType::CheckIn, &payload)?);
            }
            EventKind::Metrics => {
                let body = statsd_payload(event);
                let header = ItemHeader {
                    ty: ItemType::Statsd,
                    content_type: None,
                    length: Some(body.len()),
                };
                parts.push(format!("{}\n{}", serde_json::to_string(&header)?, body));
            }
        }

        Ok(parts.join("\n"))
    }

    fn envelope_header(&self, event: &Event, sent_at: DateTime<Utc>) -> Value {
        let mut header = Map::new();
        header.insert("event_id".into(), json!(event.id()));
        header.insert("sent_at".into(), json!(format_sent_at(&sent_at)));
        if let Some(dsn) = &self.dsn {
            header.insert("dsn".into(), json!(dsn.to_string()));
        }
        header.insert(
            "sdk".into(),
            json!({ "name": event.sdk_identifier, "version": event.sdk_version }),
        );
        if let Some(dsc) = &event.sdk_metadata.dynamic_sampling_context {
            if !dsc.is_empty() {
                header.insert("trace".into(), json!(dsc));
            }
        }
        Value::Object(header)
    }
}
