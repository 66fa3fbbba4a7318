use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::Stacktrace;

/// How an exception was observed and whether the application handled it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mechanism {
    #[serde(rename = "type")]
    pub ty: String,
    pub handled: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl Mechanism {
    pub const TYPE_GENERIC: &'static str = "generic";
    pub const TYPE_PANIC: &'static str = "panic";

    pub fn new(ty: impl Into<String>, handled: bool) -> Self {
        Self {
            ty: ty.into(),
            handled,
            data: BTreeMap::new(),
        }
    }

    /// A `generic` mechanism, the default for errors captured explicitly
    pub fn generic(handled: bool) -> Self {
        Self::new(Self::TYPE_GENERIC, handled)
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// One link of an exception chain, owned by the event it was attached to
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExceptionDataBag {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
}

impl ExceptionDataBag {
    pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            module: None,
            value: value.into(),
            stacktrace: None,
            mechanism: None,
        }
    }
}
