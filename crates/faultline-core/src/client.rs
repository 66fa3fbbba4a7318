//! The capture pipeline
//!
//! Every `capture_*` operation funnels into [`Client::capture_event`], which prepares
//! the event (exceptions, stacktrace, defaults, sampling, ignore lists, scope,
//! before-send) and hands it to the transport. Discards and transport failures are
//! logged and surface as `None`; they are never errors for the caller.

use std::any::TypeId;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use faultline_types::{
    Breadcrumb, CheckIn, Event, EventId, EventKind, ExceptionDataBag, Level, Mechanism,
    SDK_IDENTIFIER, SDK_VERSION,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rand::Rng;
use tracing::{debug, error, info};

use crate::captured_error::CapturedError;
use crate::error::ConfigError;
use crate::hint::EventHint;
use crate::integrations::{Integration, IntegrationRegistry};
use crate::last_error::last_error;
use crate::options::{Options, DEFAULT_ENVIRONMENT};
use crate::scope::Scope;
use crate::stacktrace_builder::{RawFrame, StacktraceBuilder};
use crate::transport::{NullTransport, ResultStatus, Transport};

/// Registry used by clients built without one, so process-wide integration effects
/// (global processors, the panic hook) are installed once per type
static DEFAULT_REGISTRY: Lazy<Arc<IntegrationRegistry>> =
    Lazy::new(|| Arc::new(IntegrationRegistry::new()));

/// Builder for [`Client`]
pub struct ClientBuilder {
    options: Arc<Options>,
    transport: Option<Arc<dyn Transport>>,
    registry: Option<Arc<IntegrationRegistry>>,
}

impl ClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Install integrations through `registry` instead of the process-wide default one
    pub fn integration_registry(mut self, registry: Arc<IntegrationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Install the integrations and assemble the client
    pub fn build(self) -> Result<Client, ConfigError> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::clone(&DEFAULT_REGISTRY));
        let integrations = registry.setup_integrations(&self.options)?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(NullTransport));

        Ok(Client {
            stacktrace_builder: StacktraceBuilder::new(Arc::clone(&self.options)),
            options: self.options,
            transport,
            integrations,
        })
    }
}

/// Produces events and dispatches them through a transport
pub struct Client {
    options: Arc<Options>,
    transport: Arc<dyn Transport>,
    integrations: IndexMap<TypeId, Arc<dyn Integration>>,
    stacktrace_builder: StacktraceBuilder,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field(
                "integrations",
                &self
                    .integrations
                    .values()
                    .map(|integration| integration.name())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(options: impl Into<Arc<Options>>) -> ClientBuilder {
        ClientBuilder {
            options: options.into(),
            transport: None,
            registry: None,
        }
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn stacktrace_builder(&self) -> &StacktraceBuilder {
        &self.stacktrace_builder
    }

    pub fn get_integration<T: Integration>(&self) -> Option<&T> {
        self.get_integration_by_id(TypeId::of::<T>())
            .and_then(|integration| integration.as_any().downcast_ref::<T>())
    }

    pub fn get_integration_by_id(&self, type_id: TypeId) -> Option<&Arc<dyn Integration>> {
        self.integrations.get(&type_id)
    }

    /// Record a breadcrumb on `scope`, honouring `before_breadcrumb` and `max_breadcrumbs`
    pub fn add_breadcrumb(&self, scope: &mut Scope, breadcrumb: Breadcrumb) -> bool {
        scope.add_breadcrumb(breadcrumb, &self.options)
    }

    pub async fn capture_message(
        &self,
        message: impl Into<String>,
        level: Option<Level>,
        scope: Option<&Scope>,
        hint: Option<EventHint>,
    ) -> Option<EventId> {
        let mut event = Event::error();
        event.message = Some(message.into());
        event.level = level;

        self.capture_event(event, hint, scope).await
    }

    pub async fn capture_exception(
        &self,
        exception: CapturedError,
        scope: Option<&Scope>,
        hint: Option<EventHint>,
    ) -> Option<EventId> {
        if self.options.is_exception_ignored(exception.type_name()) {
            info!(
                exception = exception.type_name(),
                "The exception will be discarded because it matches an entry of the ignore list."
            );
            return None;
        }

        let mut hint = hint.unwrap_or_default();
        hint.exception = Some(exception);

        self.capture_event(Event::error(), Some(hint), scope).await
    }

    /// Capture any `std::error::Error` together with its source chain
    pub async fn capture_error<E>(&self, error: &E, scope: Option<&Scope>) -> Option<EventId>
    where
        E: StdError + 'static,
    {
        self.capture_exception(CapturedError::from_error(error), scope, None)
            .await
    }

    pub async fn capture_event(
        &self,
        event: Event,
        hint: Option<EventHint>,
        scope: Option<&Scope>,
    ) -> Option<EventId> {
        let event = self.prepare_event(event, hint.as_ref(), scope)?;
        let event_id = event.id();

        match self.transport.send(event).await {
            Ok(result) if result.status == ResultStatus::Success => {
                result.event.map(|event| event.id())
            }
            Ok(result) => {
                debug!(
                    event_id = %event_id,
                    status = %result.status,
                    "The event was not accepted by the transport"
                );
                None
            }
            Err(err) => {
                error!(
                    event_id = %event_id,
                    error = %err,
                    "Failed to send the event to the transport"
                );
                None
            }
        }
    }

    /// Report the last recorded panic or error, if there is one with a message
    pub async fn capture_last_error(
        &self,
        scope: Option<&Scope>,
        hint: Option<EventHint>,
    ) -> Option<EventId> {
        let record = last_error()?;
        if record.message.is_empty() {
            return None;
        }

        let mut exception = CapturedError::new(record.kind.clone(), record.message.clone());
        if record.file.is_some() {
            exception = exception.with_frames(vec![RawFrame {
                file: record.file.clone(),
                line: record.line,
                ..RawFrame::default()
            }]);
        }

        let mut hint = hint.unwrap_or_default();
        if hint.mechanism.is_none() && record.is_panic() {
            hint.mechanism = Some(Mechanism::new(Mechanism::TYPE_PANIC, false));
        }
        if let Some(thread) = &record.thread {
            hint.extra
                .entry("thread".to_string())
                .or_insert_with(|| thread.clone().into());
        }

        self.capture_exception(exception, scope, Some(hint)).await
    }

    /// Send a cron monitor check-in and return its id
    pub async fn capture_check_in(
        &self,
        check_in: CheckIn,
        scope: Option<&Scope>,
    ) -> Option<EventId> {
        let check_in_id = check_in.id;
        self.capture_event(Event::check_in(check_in), None, scope)
            .await
            .map(|_| check_in_id)
    }

    /// Wait for the transport to drain; `timeout` defaults to `shutdown_timeout`
    pub async fn flush(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or_else(|| self.options.shutdown_timeout());
        match self.transport.close(Some(timeout)).await {
            Ok(drained) => drained,
            Err(err) => {
                error!(error = %err, "Failed to flush the transport");
                false
            }
        }
    }

    fn prepare_event(
        &self,
        mut event: Event,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Option<Event> {
        if let Some(hint) = hint {
            if let Some(exception) = &hint.exception {
                if event.exceptions.is_empty() {
                    self.add_exception_to_event(&mut event, exception, hint.mechanism.as_ref());
                }
            }
            if event.stacktrace.is_none() {
                event.stacktrace = hint.stacktrace.clone();
            }
        }

        if event.stacktrace.is_none()
            && self.options.attach_stacktrace()
            && event.exceptions.is_empty()
        {
            let stacktrace = self.stacktrace_builder.build_current();
            if !stacktrace.is_empty() {
                event.stacktrace = Some(stacktrace);
            }
        }

        event.sdk_identifier = SDK_IDENTIFIER.to_string();
        event.sdk_version = SDK_VERSION.to_string();

        for (key, value) in self.options.tags() {
            event.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }

        if event.server_name.is_none() {
            event.server_name = self.options.server_name().map(str::to_string);
        }
        if event.release.is_none() {
            event.release = self.options.release().map(str::to_string);
        }
        if event.environment.is_none() {
            event.environment = Some(
                self.options
                    .environment()
                    .unwrap_or(DEFAULT_ENVIRONMENT)
                    .to_string(),
            );
        }
        if event.dist.is_none() {
            event.dist = self.options.dist().map(str::to_string);
        }

        if event.kind() == EventKind::Error && self.is_sampled_out() {
            info!(
                event_id = %event.id(),
                sample_rate = self.options.sample_rate(),
                "The event will be discarded because it has been sampled."
            );
            return None;
        }

        if self.is_ignored(&event) {
            return None;
        }

        let unprocessed = event.clone();
        let default_hint = EventHint::default();
        let processor_hint = hint.unwrap_or(&default_hint);
        let processed = match scope {
            Some(scope) => scope.apply_to_event(event, processor_hint, &self.options),
            None => Scope::apply_global_event_processors(event, processor_hint),
        };
        match processed {
            Some(processed) => event = processed,
            None => {
                info!(
                    event_id = %unprocessed.id(),
                    "The event will be discarded because one of the event processors returned \"None\"."
                );
                debug!(event = ?unprocessed, "Event before the vetoing processor");
                return None;
            }
        }

        self.apply_before_send_callback(event, hint)
    }

    /// Draw in (0, 1]; a draw equal to the rate is kept
    fn is_sampled_out(&self) -> bool {
        let draw = 1.0 - rand::thread_rng().gen::<f64>();
        draw > self.options.sample_rate()
    }

    fn is_ignored(&self, event: &Event) -> bool {
        match event.kind() {
            EventKind::Error => {
                let ignored = event.exceptions.iter().find(|bag| {
                    let full_name = match &bag.module {
                        Some(module) => format!("{module}::{}", bag.ty),
                        None => bag.ty.clone(),
                    };
                    self.options.is_exception_ignored(&full_name)
                });
                if let Some(bag) = ignored {
                    info!(
                        event_id = %event.id(),
                        exception = %bag.ty,
                        "The event will be discarded because it matches an entry in \"ignore_exceptions\"."
                    );
                    return true;
                }
                false
            }
            EventKind::Transaction => match event.transaction.as_deref() {
                Some(transaction) if self.options.is_transaction_ignored(transaction) => {
                    info!(
                        event_id = %event.id(),
                        transaction,
                        "The event will be discarded because it matches an entry in \"ignore_transactions\"."
                    );
                    true
                }
                _ => false,
            },
            EventKind::CheckIn | EventKind::Metrics => false,
        }
    }

    fn apply_before_send_callback(&self, event: Event, hint: Option<&EventHint>) -> Option<Event> {
        let (callback, name) = match event.kind() {
            EventKind::Error => (self.options.before_send(), "before_send"),
            EventKind::Transaction => (
                self.options.before_send_transaction(),
                "before_send_transaction",
            ),
            EventKind::CheckIn => (self.options.before_send_check_in(), "before_send_check_in"),
            EventKind::Metrics => (self.options.before_send_metrics(), "before_send_metrics"),
        };

        let Some(callback) = callback else {
            return Some(event);
        };

        let event_id = event.id();
        let processed = callback(event, hint);
        if processed.is_none() {
            info!(
                event_id = %event_id,
                callback = name,
                "The event will be discarded because the \"{}\" callback returned \"None\".",
                name
            );
        }
        processed
    }

    /// One bag per link of the causal chain, outermost first
    fn add_exception_to_event(
        &self,
        event: &mut Event,
        exception: &CapturedError,
        mechanism: Option<&Mechanism>,
    ) {
        for link in exception.chain() {
            let mut bag = ExceptionDataBag::new(link.short_type_name(), link.message());
            bag.module = link.module().map(str::to_string);

            if !link.frames().is_empty() {
                let stacktrace = self.stacktrace_builder.build_from_error(link);
                if !stacktrace.is_empty() {
                    bag.stacktrace = Some(stacktrace);
                }
            }

            bag.mechanism = Some(match mechanism {
                Some(mechanism) => mechanism.clone(),
                None => {
                    let generic = Mechanism::generic(true);
                    match link.code() {
                        Some(code) => generic.with_data("code", code),
                        None => generic,
                    }
                }
            });

            event.exceptions.push(bag);
        }

        if event.level.is_none() {
            event.level = Some(Level::Error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(options: Options) -> Client {
        Client::builder(options).build().unwrap()
    }

    #[test]
    fn sample_rate_bounds() {
        let always = client(
            Options::builder()
                .sample_rate(1.0)
                .default_integrations(false)
                .build()
                .unwrap(),
        );
        let never = client(
            Options::builder()
                .sample_rate(0.0)
                .default_integrations(false)
                .build()
                .unwrap(),
        );
        for _ in 0..1000 {
            assert!(!always.is_sampled_out());
            assert!(never.is_sampled_out());
        }
    }

    #[test]
    fn prepare_event_keeps_preset_fields() {
        let client = client(
            Options::builder()
                .release("2.0.0")
                .environment("staging")
                .server_name("web-1")
                .tag("region", "eu")
                .default_integrations(false)
                .build()
                .unwrap(),
        );

        let mut event = Event::error();
        event.release = Some("1.0.0".into());
        event.environment = Some("dev".into());
        event.server_name = Some("local".into());
        event.set_tag("region", "us");

        let prepared = client.prepare_event(event, None, None).unwrap();
        assert_eq!(prepared.release.as_deref(), Some("1.0.0"));
        assert_eq!(prepared.environment.as_deref(), Some("dev"));
        assert_eq!(prepared.server_name.as_deref(), Some("local"));
        assert_eq!(prepared.tags["region"], "us");
        assert_eq!(prepared.sdk_identifier, SDK_IDENTIFIER);
    }

    #[test]
    fn environment_falls_back_to_production() {
        let client = client(Options::builder().default_integrations(false).build().unwrap());
        let prepared = client.prepare_event(Event::error(), None, None).unwrap();
        assert_eq!(prepared.environment.as_deref(), Some(DEFAULT_ENVIRONMENT));
        assert!(prepared.release.is_none());
    }

    #[test]
    fn exception_chain_is_flattened_outermost_first() {
        let client = client(Options::builder().default_integrations(false).build().unwrap());
        let exception = CapturedError::new("app::Outer", "outer")
            .with_source(
                CapturedError::new("app::Middle", "middle")
                    .with_source(CapturedError::new("std::io::error::Error", "inner").with_code(13)),
            );
        let hint = EventHint::from_exception(exception);

        let prepared = client
            .prepare_event(Event::error(), Some(&hint), None)
            .unwrap();

        let types: Vec<_> = prepared.exceptions.iter().map(|bag| bag.ty.as_str()).collect();
        assert_eq!(types, vec!["Outer", "Middle", "Error"]);
        assert_eq!(prepared.exceptions[0].module.as_deref(), Some("app"));

        let inner_mechanism = prepared.exceptions[2].mechanism.as_ref().unwrap();
        assert_eq!(inner_mechanism.ty, Mechanism::TYPE_GENERIC);
        assert!(inner_mechanism.handled);
        assert_eq!(inner_mechanism.data["code"], 13);
        assert_eq!(prepared.level, Some(Level::Error));
    }

    #[test]
    fn attach_stacktrace_only_without_exceptions() {
        let client = client(
            Options::builder()
                .attach_stacktrace(true)
                .default_integrations(false)
                .build()
                .unwrap(),
        );
        let prepared = client.prepare_event(Event::error(), None, None).unwrap();
        assert!(prepared.stacktrace.is_some());

        let hint = EventHint::from_exception(CapturedError::new("app::Failure", "boom"));
        let prepared = client
            .prepare_event(Event::error(), Some(&hint), None)
            .unwrap();
        assert!(prepared.stacktrace.is_none());
        assert_eq!(prepared.exceptions.len(), 1);
    }
}
