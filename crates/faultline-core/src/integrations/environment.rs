use std::any::Any;

use serde_json::{json, Value};

use super::Integration;
use crate::scope::Scope;

/// Adds `os`, `runtime` and `device` contexts to events that lack them
#[derive(Debug, Default)]
pub struct EnvironmentIntegration;

impl EnvironmentIntegration {
    fn os_context() -> Value {
        let mut context = json!({ "name": std::env::consts::OS });
        if let Some(kernel_version) = kernel_version() {
            context["kernel_version"] = Value::String(kernel_version);
        }
        context
    }

    fn runtime_context() -> Value {
        json!({ "name": "rust" })
    }

    fn device_context() -> Value {
        json!({ "arch": std::env::consts::ARCH })
    }
}

#[cfg(target_os = "linux")]
fn kernel_version() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|version| version.trim().to_string())
        .filter(|version| !version.is_empty())
}

#[cfg(not(target_os = "linux"))]
fn kernel_version() -> Option<String> {
    None
}

impl Integration for EnvironmentIntegration {
    fn name(&self) -> &'static str {
        "EnvironmentIntegration"
    }

    fn setup_once(&self) {
        Scope::add_global_event_processor(|mut event, _hint| {
            event
                .contexts
                .entry("os".to_string())
                .or_insert_with(Self::os_context);
            event
                .contexts
                .entry("runtime".to_string())
                .or_insert_with(Self::runtime_context);
            event
                .contexts
                .entry("device".to_string())
                .or_insert_with(Self::device_context);
            Some(event)
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
