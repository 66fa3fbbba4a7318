use std::collections::BTreeMap;

use faultline_types::{Mechanism, Stacktrace};
use serde_json::Value;

use crate::captured_error::CapturedError;

/// Side-channel data accompanying a capture call
///
/// The hint never reaches the wire itself; `prepare_event` turns its exception and
/// stacktrace into event fields, and processors / before-send callbacks can inspect it.
#[derive(Debug, Clone, Default)]
pub struct EventHint {
    pub exception: Option<CapturedError>,
    /// Overrides the generic mechanism attached to every exception of the chain
    pub mechanism: Option<Mechanism>,
    pub stacktrace: Option<Stacktrace>,
    pub extra: BTreeMap<String, Value>,
}

impl EventHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exception(exception: CapturedError) -> Self {
        Self {
            exception: Some(exception),
            ..Self::default()
        }
    }

    pub fn with_mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    pub fn with_stacktrace(mut self, stacktrace: Stacktrace) -> Self {
        self.stacktrace = Some(stacktrace);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
