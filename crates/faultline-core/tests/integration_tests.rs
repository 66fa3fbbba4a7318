use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use faultline_core::{
    EnvironmentIntegration, Event, EventHint, FrameContextIntegration, Integration,
    IntegrationRegistry, OptionAware, Options, PanicIntegration, Scope,
};
use serial_test::serial;

#[derive(Default)]
struct SetupCounter {
    setups: AtomicUsize,
}

impl Integration for SetupCounter {
    fn name(&self) -> &'static str {
        "SetupCounter"
    }

    fn setup_once(&self) {
        self.setups.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records whether options were injected before its setup hook ran
#[derive(Default)]
struct NeedsOptions {
    release_at_setup: Mutex<Option<String>>,
    options: Mutex<Option<Arc<Options>>>,
}

impl OptionAware for NeedsOptions {
    fn set_options(&self, options: Arc<Options>) {
        *self.options.lock().unwrap() = Some(options);
    }
}

impl Integration for NeedsOptions {
    fn name(&self) -> &'static str {
        "NeedsOptions"
    }

    fn setup_once(&self) {
        let release = self
            .options
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|options| options.release().map(str::to_string));
        *self.release_at_setup.lock().unwrap() = release;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_option_aware(&self) -> Option<&dyn OptionAware> {
        Some(self)
    }
}

fn options_with(integration: Arc<dyn Integration>) -> Arc<Options> {
    Arc::new(
        Options::builder()
            .default_integrations(false)
            .integration(integration)
            .build()
            .unwrap(),
    )
}

#[test]
fn test_setup_hook_runs_once_across_calls() {
    let counter = Arc::new(SetupCounter::default());
    let options = options_with(counter.clone());
    let registry = IntegrationRegistry::new();

    let first = registry.setup_integrations(&options).unwrap();
    let second = registry.setup_integrations(&options).unwrap();

    assert_eq!(counter.setups.load(Ordering::SeqCst), 1);
    assert!(first.contains_key(&TypeId::of::<SetupCounter>()));
    assert!(second.contains_key(&TypeId::of::<SetupCounter>()));
    assert!(registry.is_installed(TypeId::of::<SetupCounter>()));
}

#[test]
fn test_separate_registries_install_independently() {
    let counter = Arc::new(SetupCounter::default());
    let options = options_with(counter.clone());

    IntegrationRegistry::new().setup_integrations(&options).unwrap();
    IntegrationRegistry::new().setup_integrations(&options).unwrap();

    assert_eq!(counter.setups.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_setup_runs_hook_once() {
    let counter = Arc::new(SetupCounter::default());
    let options = options_with(counter.clone());
    let registry = Arc::new(IntegrationRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let options = Arc::clone(&options);
            thread::spawn(move || registry.setup_integrations(&options).unwrap().len())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(counter.setups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_options_are_injected_before_setup() {
    let integration = Arc::new(NeedsOptions::default());
    let options = Arc::new(
        Options::builder()
            .release("9.9.9")
            .default_integrations(false)
            .integration(integration.clone())
            .build()
            .unwrap(),
    );

    IntegrationRegistry::new().setup_integrations(&options).unwrap();

    assert_eq!(
        integration.release_at_setup.lock().unwrap().as_deref(),
        Some("9.9.9")
    );
}

#[test]
#[serial]
fn test_defaults_are_installed_and_user_type_replaces_default() {
    Scope::clear_global_event_processors();
    let user_environment: Arc<dyn Integration> = Arc::new(EnvironmentIntegration);
    let options = Arc::new(
        Options::builder()
            .integration(user_environment.clone())
            .build()
            .unwrap(),
    );

    let integrations = IntegrationRegistry::new()
        .setup_integrations(&options)
        .unwrap();

    let names: Vec<_> = integrations.values().map(|integration| integration.name()).collect();
    assert_eq!(
        names,
        vec!["FrameContextIntegration", "PanicIntegration", "EnvironmentIntegration"]
    );
    assert!(Arc::ptr_eq(
        &integrations[&TypeId::of::<EnvironmentIntegration>()],
        &user_environment
    ));
    assert!(integrations.contains_key(&TypeId::of::<FrameContextIntegration>()));
    assert!(integrations.contains_key(&TypeId::of::<PanicIntegration>()));
    Scope::clear_global_event_processors();
}

#[test]
#[serial]
fn test_customizer_receives_defaults() {
    Scope::clear_global_event_processors();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_customizer = Arc::clone(&seen);
    let options = Arc::new(
        Options::builder()
            .default_integrations(false)
            .integrations_customizer(move |defaults| {
                seen_in_customizer.store(defaults.len(), Ordering::SeqCst);
                defaults
                    .into_iter()
                    .filter(|integration| integration.name() == "EnvironmentIntegration")
                    .collect()
            })
            .build()
            .unwrap(),
    );

    let integrations = IntegrationRegistry::new()
        .setup_integrations(&options)
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert_eq!(integrations.len(), 1);
    Scope::clear_global_event_processors();
}

#[test]
#[serial]
fn test_environment_integration_adds_missing_contexts() {
    Scope::clear_global_event_processors();
    let options = options_with(Arc::new(EnvironmentIntegration));
    IntegrationRegistry::new().setup_integrations(&options).unwrap();

    let mut event = Event::error();
    event.set_context("runtime", serde_json::json!({ "name": "custom" }));
    let event = Scope::new()
        .apply_to_event(event, &EventHint::default(), &options)
        .unwrap();

    assert_eq!(event.contexts["os"]["name"], std::env::consts::OS);
    assert_eq!(event.contexts["runtime"]["name"], "custom");
    assert_eq!(event.contexts["device"]["arch"], std::env::consts::ARCH);
    Scope::clear_global_event_processors();
}
