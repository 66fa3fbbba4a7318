//! Process-wide record of the most recent unhandled error
//!
//! The panic integration writes here; `Client::capture_last_error` reads it.

use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;

/// Kind recorded by the panic hook
pub const KIND_PANIC: &str = "panic";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// What produced the record, e.g. `panic`
    pub kind: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub thread: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            file: None,
            line: None,
            thread: None,
        }
    }

    pub fn is_panic(&self) -> bool {
        self.kind == KIND_PANIC
    }
}

static LAST_ERROR: Lazy<Mutex<Option<ErrorRecord>>> = Lazy::new(|| Mutex::new(None));

pub fn record_last_error(record: ErrorRecord) {
    *LAST_ERROR.lock().unwrap_or_else(PoisonError::into_inner) = Some(record);
}

pub fn last_error() -> Option<ErrorRecord> {
    LAST_ERROR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn clear_last_error() {
    *LAST_ERROR.lock().unwrap_or_else(PoisonError::into_inner) = None;
}
