//! Contextual enrichment applied to events at capture time

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use faultline_types::{
    Breadcrumb, DynamicSamplingContext, Event, Level, SpanId, TraceId, UserDataBag,
};
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use crate::hint::EventHint;
use crate::options::{Options, DEFAULT_ENVIRONMENT};

/// Transforms an event or drops it by returning `None`
pub type EventProcessor = Arc<dyn Fn(Event, &EventHint) -> Option<Event> + Send + Sync>;

/// Processors shared by every scope of the process, run before scope processors
static GLOBAL_EVENT_PROCESSORS: Lazy<RwLock<Vec<EventProcessor>>> =
    Lazy::new(|| RwLock::new(Vec::new()));

/// Trace identity the next events are attached to
#[derive(Clone, Debug, PartialEq)]
pub struct PropagationContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub dynamic_sampling_context: Option<DynamicSamplingContext>,
}

impl PropagationContext {
    /// A fresh trace with no incoming parent
    pub fn new() -> Self {
        Self {
            trace_id: TraceId::new(),
            span_id: SpanId::new(),
            parent_span_id: None,
            dynamic_sampling_context: None,
        }
    }

    /// Continue a trace from incoming `sentry-trace` and `baggage` header values.
    ///
    /// Returns `None` when the `sentry-trace` value is malformed.
    pub fn from_headers(sentry_trace: &str, baggage: Option<&str>) -> Option<Self> {
        let mut parts = sentry_trace.trim().split('-');
        let trace_id = parts.next()?.parse::<TraceId>().ok()?;
        let parent_span_id = parts.next()?.parse::<SpanId>().ok()?;

        let dynamic_sampling_context = baggage
            .map(DynamicSamplingContext::from_baggage)
            .filter(|dsc| !dsc.is_empty());

        Some(Self {
            trace_id,
            span_id: SpanId::new(),
            parent_span_id: Some(parent_span_id),
            dynamic_sampling_context,
        })
    }

    /// Outgoing `sentry-trace` header value
    pub fn sentry_trace_header(&self) -> String {
        format!("{}-{}", self.trace_id, self.span_id)
    }

    /// The `contexts.trace` object
    pub fn trace_context(&self) -> Value {
        let mut context = serde_json::json!({
            "trace_id": self.trace_id.to_string(),
            "span_id": self.span_id.to_string(),
        });
        if let Some(parent) = self.parent_span_id {
            context["parent_span_id"] = Value::String(parent.to_string());
        }
        context
    }
}

impl Default for PropagationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable bag of enrichment data and processors
///
/// A scope is not internally synchronised: share it behind a lock or [`Scope::fork`] it.
#[derive(Clone, Default)]
pub struct Scope {
    tags: BTreeMap<String, String>,
    extra: BTreeMap<String, Value>,
    contexts: BTreeMap<String, Value>,
    user: Option<UserDataBag>,
    level: Option<Level>,
    fingerprint: Vec<String>,
    breadcrumbs: VecDeque<Breadcrumb>,
    event_processors: Vec<EventProcessor>,
    propagation_context: PropagationContext,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("tags", &self.tags)
            .field("extra", &self.extra)
            .field("contexts", &self.contexts)
            .field("user", &self.user)
            .field("level", &self.level)
            .field("fingerprint", &self.fingerprint)
            .field("breadcrumbs", &self.breadcrumbs.len())
            .field("event_processors", &self.event_processors.len())
            .field("propagation_context", &self.propagation_context)
            .finish()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for every scope of the process
    pub fn add_global_event_processor<F>(processor: F)
    where
        F: Fn(Event, &EventHint) -> Option<Event> + Send + Sync + 'static,
    {
        GLOBAL_EVENT_PROCESSORS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(processor));
    }

    /// Remove every global processor
    pub fn clear_global_event_processors() {
        GLOBAL_EVENT_PROCESSORS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn global_event_processors() -> Vec<EventProcessor> {
        GLOBAL_EVENT_PROCESSORS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn remove_tag(&mut self, key: &str) -> &mut Self {
        self.tags.remove(key);
        self
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn set_context(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.contexts.insert(name.into(), value);
        self
    }

    pub fn set_user(&mut self, user: Option<UserDataBag>) -> &mut Self {
        self.user = user;
        self
    }

    /// Level forced onto every event passing through this scope
    pub fn set_level(&mut self, level: Option<Level>) -> &mut Self {
        self.level = level;
        self
    }

    pub fn set_fingerprint(&mut self, fingerprint: Vec<String>) -> &mut Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn set_propagation_context(&mut self, context: PropagationContext) -> &mut Self {
        self.propagation_context = context;
        self
    }

    pub fn propagation_context(&self) -> &PropagationContext {
        &self.propagation_context
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn user(&self) -> Option<&UserDataBag> {
        self.user.as_ref()
    }

    pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.breadcrumbs.iter()
    }

    pub fn add_event_processor<F>(&mut self, processor: F) -> &mut Self
    where
        F: Fn(Event, &EventHint) -> Option<Event> + Send + Sync + 'static,
    {
        self.event_processors.push(Arc::new(processor));
        self
    }

    /// Record a breadcrumb, keeping at most `max_breadcrumbs` of the newest ones.
    ///
    /// Returns `false` when the breadcrumb was dropped by `before_breadcrumb` or
    /// breadcrumbs are disabled.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb, options: &Options) -> bool {
        let max = options.max_breadcrumbs();
        if max == 0 {
            return false;
        }

        let breadcrumb = match options.before_breadcrumb() {
            Some(callback) => match callback(breadcrumb) {
                Some(breadcrumb) => breadcrumb,
                None => return false,
            },
            None => breadcrumb,
        };

        while self.breadcrumbs.len() >= max {
            self.breadcrumbs.pop_front();
        }
        self.breadcrumbs.push_back(breadcrumb);
        true
    }

    pub fn clear_breadcrumbs(&mut self) {
        self.breadcrumbs.clear();
    }

    /// Reset everything but the event processors
    pub fn clear(&mut self) {
        *self = Self {
            event_processors: std::mem::take(&mut self.event_processors),
            ..Self::default()
        };
    }

    /// An independent copy of this scope
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Run `callback` against a fork; nothing it changes is visible afterwards
    pub fn with_scope<R>(&self, callback: impl FnOnce(&mut Scope) -> R) -> R {
        let mut fork = self.fork();
        callback(&mut fork)
    }

    /// Merge the scope into `event` and run the global then scope processors.
    ///
    /// Data already present on the event wins over scope data, except for the level
    /// which the scope overrides when set.
    pub fn apply_to_event(
        &self,
        mut event: Event,
        hint: &EventHint,
        options: &Options,
    ) -> Option<Event> {
        for (key, value) in &self.tags {
            event.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in &self.extra {
            event.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in &self.contexts {
            event
                .contexts
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if let Some(scope_user) = &self.user {
            event.user = Some(match event.user.take() {
                Some(event_user) => scope_user.clone().merge(&event_user),
                None => scope_user.clone(),
            });
        }

        if self.level.is_some() {
            event.level = self.level;
        }

        if event.fingerprint.is_empty() && !self.fingerprint.is_empty() {
            event.fingerprint = self.fingerprint.clone();
        }

        if !self.breadcrumbs.is_empty() {
            event.breadcrumbs = self.breadcrumbs.iter().cloned().collect();
        }

        event
            .contexts
            .entry("trace".to_string())
            .or_insert_with(|| self.propagation_context.trace_context());

        if event.sdk_metadata.dynamic_sampling_context.is_none() {
            let dsc = self
                .propagation_context
                .dynamic_sampling_context
                .clone()
                .unwrap_or_else(|| self.dynamic_sampling_context_from_options(options));
            event.sdk_metadata.dynamic_sampling_context = Some(dsc);
        }

        let processors = Self::global_event_processors()
            .into_iter()
            .chain(self.event_processors.iter().cloned());
        run_processors(processors, event, hint)
    }

    /// Run only the process-wide processors, for captures made without a scope
    pub fn apply_global_event_processors(event: Event, hint: &EventHint) -> Option<Event> {
        run_processors(Self::global_event_processors(), event, hint)
    }

    fn dynamic_sampling_context_from_options(&self, options: &Options) -> DynamicSamplingContext {
        let mut dsc = DynamicSamplingContext::new()
            .with("trace_id", self.propagation_context.trace_id.to_string())
            .with("sample_rate", options.sample_rate().to_string())
            .with(
                "environment",
                options.environment().unwrap_or(DEFAULT_ENVIRONMENT),
            );
        if let Some(dsn) = options.dsn() {
            dsc.set("public_key", dsn.public_key());
        }
        if let Some(release) = options.release() {
            dsc.set("release", release);
        }
        dsc
    }
}

fn run_processors(
    processors: impl IntoIterator<Item = EventProcessor>,
    mut event: Event,
    hint: &EventHint,
) -> Option<Event> {
    for processor in processors {
        let event_id = event.id();
        match processor(event, hint) {
            Some(processed) => event = processed,
            None => {
                debug!(event_id = %event_id, "Event processor returned None");
                return None;
            }
        }
    }
    Some(event)
}
