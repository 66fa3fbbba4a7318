//! JSON bodies of the envelope items

use serde_json::{json, Map, Value};

use crate::utils::timestamp_to_f64;
use crate::{Event, EventKind, PLATFORM};

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.clone()));
    }
}

/// Body of an `event` or `transaction` item
pub(crate) fn event_payload(event: &Event) -> Result<Value, serde_json::Error> {
    let mut map = Map::new();

    map.insert("event_id".into(), json!(event.id()));
    map.insert("timestamp".into(), json!(timestamp_to_f64(&event.timestamp)));
    map.insert("platform".into(), json!(PLATFORM));
    map.insert(
        "sdk".into(),
        json!({ "name": event.sdk_identifier, "version": event.sdk_version }),
    );

    if event.kind() == EventKind::Transaction {
        map.insert("type".into(), json!("transaction"));
        if let Some(start) = &event.start_timestamp {
            map.insert("start_timestamp".into(), json!(timestamp_to_f64(start)));
        }
    }

    if let Some(level) = event.level {
        map.insert("level".into(), json!(level));
    }
    insert_opt(&mut map, "logger", &event.logger);
    insert_opt(&mut map, "transaction", &event.transaction);
    insert_opt(&mut map, "server_name", &event.server_name);
    insert_opt(&mut map, "release", &event.release);
    insert_opt(&mut map, "environment", &event.environment);
    insert_opt(&mut map, "dist", &event.dist);

    if !event.fingerprint.is_empty() {
        map.insert("fingerprint".into(), json!(event.fingerprint));
    }
    if !event.extra.is_empty() {
        map.insert("extra".into(), json!(event.extra));
    }
    if !event.tags.is_empty() {
        map.insert("tags".into(), json!(event.tags));
    }
    if let Some(user) = &event.user {
        map.insert("user".into(), serde_json::to_value(user)?);
    }
    if !event.contexts.is_empty() {
        map.insert("contexts".into(), json!(event.contexts));
    }
    if !event.breadcrumbs.is_empty() {
        map.insert(
            "breadcrumbs".into(),
            json!({ "values": serde_json::to_value(&event.breadcrumbs)? }),
        );
    }
    if event.kind() == EventKind::Transaction && !event.spans.is_empty() {
        map.insert("spans".into(), serde_json::to_value(&event.spans)?);
    }

    if let Some(message) = &event.message {
        if event.message_params.is_empty() {
            map.insert("message".into(), json!(message));
        } else {
            let mut object = json!({
                "message": message,
                "params": event.message_params,
            });
            if let Some(formatted) = &event.message_formatted {
                object["formatted"] = json!(formatted);
            }
            map.insert("message".into(), object);
        }
    }

    if !event.exceptions.is_empty() {
        // the protocol lists the root cause first
        let values = event
            .exceptions
            .iter()
            .rev()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        map.insert("exception".into(), json!({ "values": values }));
    }

    if let Some(stacktrace) = &event.stacktrace {
        map.insert("stacktrace".into(), serde_json::to_value(stacktrace)?);
    }

    Ok(Value::Object(map))
}

/// Body of a `check_in` item, `None` when the event carries no check-in
pub(crate) fn check_in_payload(event: &Event) -> Option<Value> {
    let check_in = event.check_in.as_ref()?;

    let mut payload = json!({
        "check_in_id": check_in.id,
        "monitor_slug": check_in.monitor_slug,
        "status": check_in.status,
        "release": check_in.release.as_ref().or(event.release.as_ref()),
        "environment": check_in.environment.as_ref().or(event.environment.as_ref()),
    });
    if let Some(duration) = check_in.duration {
        payload["duration"] = json!(duration);
    }
    if let Some(config) = &check_in.monitor_config {
        payload["monitor_config"] = json!(config);
    }
    if let Some(trace_id) = event.trace_id() {
        payload["contexts"] = json!({ "trace": { "trace_id": trace_id } });
    }

    Some(payload)
}

/// Body of a `statsd` item: one line per metric
pub(crate) fn statsd_payload(event: &Event) -> String {
    event
        .metrics
        .iter()
        .map(|metric| metric.to_statsd_line())
        .collect::<Vec<_>>()
        .join("\n")
}
