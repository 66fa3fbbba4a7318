use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Information about the user an event happened to
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserDataBag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(flatten)]
    pub data: BTreeMap<String, Value>,
}

impl UserDataBag {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Overlay `other` on top of `self`: every field set in `other` wins
    pub fn merge(mut self, other: &UserDataBag) -> Self {
        if other.id.is_some() {
            self.id = other.id.clone();
        }
        if other.username.is_some() {
            self.username = other.username.clone();
        }
        if other.email.is_some() {
            self.email = other.email.clone();
        }
        if other.ip_address.is_some() {
            self.ip_address = other.ip_address.clone();
        }
        if other.segment.is_some() {
            self.segment = other.segment.clone();
        }
        self.data
            .extend(other.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}
