use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use faultline_core::types::{Breadcrumb, UserDataBag};
use faultline_core::{Event, EventHint, Level, Options, PropagationContext, Scope};
use serde_json::json;
use serial_test::serial;

fn options() -> Options {
    Options::builder()
        .dsn("https://public@example.com/42")
        .release("3.1.0")
        .default_integrations(false)
        .build()
        .unwrap()
}

#[test]
#[serial]
fn test_event_data_wins_over_scope_data() {
    Scope::clear_global_event_processors();
    let mut scope = Scope::new();
    scope
        .set_tag("region", "eu")
        .set_tag("team", "payments")
        .set_extra("attempt", 2)
        .set_context("app", json!({ "name": "scope" }));

    let mut event = Event::error();
    event.set_tag("region", "us");
    event.set_context("app", json!({ "name": "event" }));

    let event = scope
        .apply_to_event(event, &EventHint::default(), &options())
        .unwrap();

    assert_eq!(event.tags["region"], "us");
    assert_eq!(event.tags["team"], "payments");
    assert_eq!(event.extra["attempt"], 2);
    assert_eq!(event.contexts["app"]["name"], "event");
}

#[test]
#[serial]
fn test_user_fields_merge_with_event_fields_winning() {
    Scope::clear_global_event_processors();
    let mut scope = Scope::new();
    scope.set_user(Some(UserDataBag {
        id: Some("scope-id".into()),
        email: Some("scope@example.com".into()),
        ..UserDataBag::default()
    }));

    let mut event = Event::error();
    event.user = Some(UserDataBag::with_id("event-id"));

    let event = scope
        .apply_to_event(event, &EventHint::default(), &options())
        .unwrap();

    let user = event.user.unwrap();
    assert_eq!(user.id.as_deref(), Some("event-id"));
    assert_eq!(user.email.as_deref(), Some("scope@example.com"));
}

#[test]
#[serial]
fn test_level_fingerprint_and_breadcrumbs() {
    Scope::clear_global_event_processors();
    let options = options();
    let mut scope = Scope::new();
    scope
        .set_level(Some(Level::Fatal))
        .set_fingerprint(vec!["{{ default }}".into(), "db".into()]);
    scope.add_breadcrumb(
        Breadcrumb::new(Level::Info, Breadcrumb::TYPE_HTTP, "http").with_message("GET /"),
        &options,
    );

    let mut event = Event::error();
    event.level = Some(Level::Warning);
    let event = scope
        .apply_to_event(event, &EventHint::default(), &options)
        .unwrap();
    assert_eq!(event.level, Some(Level::Fatal));
    assert_eq!(event.fingerprint, vec!["{{ default }}", "db"]);
    assert_eq!(event.breadcrumbs.len(), 1);

    let mut event = Event::error();
    event.fingerprint = vec!["custom".into()];
    let event = scope
        .apply_to_event(event, &EventHint::default(), &options)
        .unwrap();
    assert_eq!(event.fingerprint, vec!["custom"]);
}

#[test]
#[serial]
fn test_trace_context_and_dsc_from_options() {
    Scope::clear_global_event_processors();
    let scope = Scope::new();
    let event = scope
        .apply_to_event(Event::error(), &EventHint::default(), &options())
        .unwrap();

    let trace_id = scope.propagation_context().trace_id.to_string();
    assert_eq!(event.contexts["trace"]["trace_id"], trace_id.as_str());

    let dsc = event.sdk_metadata.dynamic_sampling_context.unwrap();
    assert_eq!(dsc.get("trace_id"), Some(trace_id.as_str()));
    assert_eq!(dsc.get("public_key"), Some("public"));
    assert_eq!(dsc.get("release"), Some("3.1.0"));
    assert_eq!(dsc.get("environment"), Some("production"));
}

#[test]
#[serial]
fn test_incoming_dsc_is_propagated() {
    Scope::clear_global_event_processors();
    let mut scope = Scope::new();
    scope.set_propagation_context(
        PropagationContext::from_headers(
            "771a43a4192642f0b136d5159a501700-9c2a6db8c79068a2",
            Some("sentry-trace_id=771a43a4192642f0b136d5159a501700,sentry-sample_rate=0.5"),
        )
        .unwrap(),
    );

    let event = scope
        .apply_to_event(Event::error(), &EventHint::default(), &options())
        .unwrap();

    assert_eq!(
        event.contexts["trace"]["parent_span_id"],
        "9c2a6db8c79068a2"
    );
    let dsc = event.sdk_metadata.dynamic_sampling_context.unwrap();
    assert_eq!(dsc.get("sample_rate"), Some("0.5"));
    assert_eq!(dsc.get("public_key"), None);
}

#[test]
#[serial]
fn test_processor_veto_short_circuits() {
    Scope::clear_global_event_processors();
    let later_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later_calls);

    let mut scope = Scope::new();
    scope.add_event_processor(|_event, _hint| None);
    scope.add_event_processor(move |event, _hint| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(event)
    });

    assert!(scope
        .apply_to_event(Event::error(), &EventHint::default(), &options())
        .is_none());
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
}

#[test]
#[serial]
fn test_global_processor_veto_applies_to_every_scope() {
    Scope::clear_global_event_processors();
    Scope::add_global_event_processor(|event, _hint| {
        (event.message.as_deref() != Some("noisy")).then_some(event)
    });

    let mut noisy = Event::error();
    noisy.message = Some("noisy".into());

    assert!(Scope::new()
        .apply_to_event(noisy.clone(), &EventHint::default(), &options())
        .is_none());
    assert!(Scope::new()
        .fork()
        .apply_to_event(noisy, &EventHint::default(), &options())
        .is_none());
    assert!(Scope::new()
        .apply_to_event(Event::error(), &EventHint::default(), &options())
        .is_some());

    Scope::clear_global_event_processors();
}

#[test]
fn test_forks_are_independent() {
    let mut scope = Scope::new();
    scope.set_tag("shared", "1");
    let mut fork = scope.fork();
    fork.set_tag("fork_only", "1");
    scope.remove_tag("shared");

    assert!(scope.tags().is_empty());
    assert_eq!(fork.tags().len(), 2);
}
