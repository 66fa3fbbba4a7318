use std::any::Any;
use std::panic::{self, PanicHookInfo};

use super::Integration;
use crate::last_error::{record_last_error, ErrorRecord, KIND_PANIC};

/// Records every panic as the process' last error, then defers to the previous hook
#[derive(Debug, Default)]
pub struct PanicIntegration;

/// Message carried by a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

fn record_panic(info: &PanicHookInfo<'_>) {
    let mut record = ErrorRecord::new(KIND_PANIC, panic_message(info.payload()));
    if let Some(location) = info.location() {
        record.file = Some(location.file().to_string());
        record.line = Some(location.line());
    }
    record.thread = std::thread::current().name().map(str::to_string);
    record_last_error(record);
}

impl Integration for PanicIntegration {
    fn name(&self) -> &'static str {
        "PanicIntegration"
    }

    fn setup_once(&self) {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            record_panic(info);
            previous(info);
        }));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "Box<dyn Any>");
    }
}
