use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::utils::serialize_timestamp;
use crate::Level;

/// A trail entry recorded before an event happened
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Breadcrumb {
    #[serde(rename = "type")]
    pub ty: String,
    pub category: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Breadcrumb {
    pub const TYPE_DEFAULT: &'static str = "default";
    pub const TYPE_HTTP: &'static str = "http";
    pub const TYPE_NAVIGATION: &'static str = "navigation";
    pub const TYPE_ERROR: &'static str = "error";

    pub fn new(level: Level, ty: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            category: category.into(),
            level,
            message: None,
            data: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}
