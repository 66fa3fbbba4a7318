//! Client options
//!
//! [`Options`] are built once through [`OptionsBuilder`], validated, and then shared
//! read-only (behind an `Arc`) by the client, the stacktrace builder, scopes and
//! integrations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use faultline_types::{Breadcrumb, Dsn, Event};

use crate::error::ConfigError;
use crate::hint::EventHint;
use crate::integrations::{Integration, Integrations};

/// Environment reported when none is configured
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Upper bound for `max_breadcrumbs`
pub const MAX_BREADCRUMBS: usize = 100;

/// Final veto/transform hook for an event; returning `None` drops the event
pub type EventCallback = Arc<dyn Fn(Event, Option<&EventHint>) -> Option<Event> + Send + Sync>;

/// Hook run for every breadcrumb before it is recorded; returning `None` drops it
pub type BreadcrumbCallback = Arc<dyn Fn(Breadcrumb) -> Option<Breadcrumb> + Send + Sync>;

/// Explicit "is-a" table for error type names.
///
/// Rust errors have no inheritance, so ignore lists match against this table: an
/// error whose type (or any declared ancestor of it) is ignored gets discarded.
#[derive(Clone, Debug, Default)]
pub struct TypeHierarchy {
    parents: HashMap<String, String>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `child` as a subtype of `parent`
    pub fn declare(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.parents.insert(child.into(), parent.into());
    }

    /// `ty` followed by all of its ancestors, nearest first
    pub fn lineage<'a>(&'a self, ty: &'a str) -> Vec<&'a str> {
        let mut lineage = vec![ty];
        let mut current = ty;
        // a cyclic table cannot produce more ancestors than it has entries
        while let Some(parent) = self.parents.get(current) {
            if lineage.len() > self.parents.len() || lineage.contains(&parent.as_str()) {
                break;
            }
            lineage.push(parent);
            current = parent;
        }
        lineage
    }

    pub fn is_subtype_of(&self, ty: &str, ancestor: &str) -> bool {
        self.lineage(ty).contains(&ancestor)
    }
}

/// Immutable client configuration
#[derive(Clone)]
pub struct Options {
    dsn: Option<Dsn>,
    sample_rate: f64,
    attach_stacktrace: bool,
    context_lines: Option<usize>,
    release: Option<String>,
    environment: Option<String>,
    server_name: Option<String>,
    dist: Option<String>,
    tags: BTreeMap<String, String>,
    ignore_exceptions: Vec<String>,
    exception_hierarchy: TypeHierarchy,
    ignore_transactions: Vec<String>,
    in_app_include: Vec<String>,
    in_app_exclude: Vec<String>,
    prefixes: Vec<String>,
    max_breadcrumbs: usize,
    before_breadcrumb: Option<BreadcrumbCallback>,
    before_send: Option<EventCallback>,
    before_send_transaction: Option<EventCallback>,
    before_send_check_in: Option<EventCallback>,
    before_send_metrics: Option<EventCallback>,
    default_integrations: bool,
    integrations: Integrations,
    http_compression: bool,
    http_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Options read from `FAULTLINE_*` environment variables, everything else default
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env()?.build()
    }

    pub fn dsn(&self) -> Option<&Dsn> {
        self.dsn.as_ref()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn attach_stacktrace(&self) -> bool {
        self.attach_stacktrace
    }

    /// Lines of source context around each in-app frame, `None` disables it
    pub fn context_lines(&self) -> Option<usize> {
        self.context_lines
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn dist(&self) -> Option<&str> {
        self.dist.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn ignore_exceptions(&self) -> &[String] {
        &self.ignore_exceptions
    }

    pub fn exception_hierarchy(&self) -> &TypeHierarchy {
        &self.exception_hierarchy
    }

    pub fn ignore_transactions(&self) -> &[String] {
        &self.ignore_transactions
    }

    pub fn in_app_include(&self) -> &[String] {
        &self.in_app_include
    }

    pub fn in_app_exclude(&self) -> &[String] {
        &self.in_app_exclude
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn max_breadcrumbs(&self) -> usize {
        self.max_breadcrumbs
    }

    pub fn before_breadcrumb(&self) -> Option<&BreadcrumbCallback> {
        self.before_breadcrumb.as_ref()
    }

    pub fn before_send(&self) -> Option<&EventCallback> {
        self.before_send.as_ref()
    }

    pub fn before_send_transaction(&self) -> Option<&EventCallback> {
        self.before_send_transaction.as_ref()
    }

    pub fn before_send_check_in(&self) -> Option<&EventCallback> {
        self.before_send_check_in.as_ref()
    }

    pub fn before_send_metrics(&self) -> Option<&EventCallback> {
        self.before_send_metrics.as_ref()
    }

    pub fn default_integrations(&self) -> bool {
        self.default_integrations
    }

    pub fn integrations(&self) -> &Integrations {
        &self.integrations
    }

    pub fn http_compression(&self) -> bool {
        self.http_compression
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Whether an error type name, or any of its declared ancestors, is ignored.
    ///
    /// Both the full path (`std::io::error::Error`) and the bare type name (`Error`)
    /// are tried.
    pub fn is_exception_ignored(&self, type_name: &str) -> bool {
        if self.ignore_exceptions.is_empty() {
            return false;
        }
        let short = short_type_name(type_name);
        [type_name, short].iter().any(|name| {
            self.exception_hierarchy
                .lineage(name)
                .iter()
                .any(|candidate| self.ignore_exceptions.iter().any(|ignored| ignored == candidate))
        })
    }

    pub fn is_transaction_ignored(&self, transaction: &str) -> bool {
        self.ignore_transactions.iter().any(|ignored| ignored == transaction)
    }
}

impl Default for Options {
    fn default() -> Self {
        OptionsBuilder::default().into_options(None)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("dsn", &self.dsn.as_ref().map(ToString::to_string))
            .field("sample_rate", &self.sample_rate)
            .field("attach_stacktrace", &self.attach_stacktrace)
            .field("context_lines", &self.context_lines)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("dist", &self.dist)
            .field("tags", &self.tags)
            .field("ignore_exceptions", &self.ignore_exceptions)
            .field("ignore_transactions", &self.ignore_transactions)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("before_send", &self.before_send.as_ref().map(|_| "<function>"))
            .field("default_integrations", &self.default_integrations)
            .field("integrations", &self.integrations)
            .field("http_compression", &self.http_compression)
            .finish_non_exhaustive()
    }
}

/// Strip the module path and generic arguments: `my_app::Error<T>` -> `Error`
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// Builder for [`Options`]
pub struct OptionsBuilder {
    dsn: Option<String>,
    sample_rate: f64,
    attach_stacktrace: bool,
    context_lines: Option<usize>,
    release: Option<String>,
    environment: Option<String>,
    server_name: Option<String>,
    dist: Option<String>,
    tags: BTreeMap<String, String>,
    ignore_exceptions: Vec<String>,
    exception_hierarchy: TypeHierarchy,
    ignore_transactions: Vec<String>,
    in_app_include: Vec<String>,
    in_app_exclude: Vec<String>,
    prefixes: Vec<String>,
    max_breadcrumbs: usize,
    before_breadcrumb: Option<BreadcrumbCallback>,
    before_send: Option<EventCallback>,
    before_send_transaction: Option<EventCallback>,
    before_send_check_in: Option<EventCallback>,
    before_send_metrics: Option<EventCallback>,
    default_integrations: bool,
    integrations: Integrations,
    mixed_integrations: bool,
    http_compression: bool,
    http_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self {
            dsn: None,
            sample_rate: 1.0,
            attach_stacktrace: false,
            context_lines: Some(5),
            release: None,
            environment: None,
            server_name: None,
            dist: None,
            tags: BTreeMap::new(),
            ignore_exceptions: Vec::new(),
            exception_hierarchy: TypeHierarchy::new(),
            ignore_transactions: Vec::new(),
            in_app_include: Vec::new(),
            in_app_exclude: Vec::new(),
            prefixes: Vec::new(),
            max_breadcrumbs: MAX_BREADCRUMBS,
            before_breadcrumb: None,
            before_send: None,
            before_send_transaction: None,
            before_send_check_in: None,
            before_send_metrics: None,
            default_integrations: true,
            integrations: Integrations::default(),
            mixed_integrations: false,
            http_compression: true,
            http_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar { name, value }),
    }
}

impl OptionsBuilder {
    /// An empty string means "no DSN": events are prepared but go nowhere
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn attach_stacktrace(mut self, attach: bool) -> Self {
        self.attach_stacktrace = attach;
        self
    }

    pub fn context_lines(mut self, lines: Option<usize>) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn dist(mut self, dist: impl Into<String>) -> Self {
        self.dist = Some(dist.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Ignore errors by type name (full path or bare name)
    pub fn ignore_exception(mut self, type_name: impl Into<String>) -> Self {
        self.ignore_exceptions.push(type_name.into());
        self
    }

    /// Ignore errors of type `T`
    pub fn ignore_exception_type<T: ?Sized + 'static>(self) -> Self {
        self.ignore_exception(std::any::type_name::<T>())
    }

    /// Declare `child` as a subtype of `parent` for ignore-list matching
    pub fn exception_subtype(
        mut self,
        child: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        self.exception_hierarchy.declare(child, parent);
        self
    }

    pub fn ignore_transaction(mut self, name: impl Into<String>) -> Self {
        self.ignore_transactions.push(name.into());
        self
    }

    pub fn in_app_include(mut self, prefix: impl Into<String>) -> Self {
        self.in_app_include.push(prefix.into());
        self
    }

    pub fn in_app_exclude(mut self, prefix: impl Into<String>) -> Self {
        self.in_app_exclude.push(prefix.into());
        self
    }

    /// Path prefix stripped from frame file names
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn max_breadcrumbs(mut self, max: usize) -> Self {
        self.max_breadcrumbs = max;
        self
    }

    pub fn before_breadcrumb<F>(mut self, callback: F) -> Self
    where
        F: Fn(Breadcrumb) -> Option<Breadcrumb> + Send + Sync + 'static,
    {
        self.before_breadcrumb = Some(Arc::new(callback));
        self
    }

    pub fn before_send<F>(mut self, callback: F) -> Self
    where
        F: Fn(Event, Option<&EventHint>) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send = Some(Arc::new(callback));
        self
    }

    pub fn before_send_transaction<F>(mut self, callback: F) -> Self
    where
        F: Fn(Event, Option<&EventHint>) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send_transaction = Some(Arc::new(callback));
        self
    }

    pub fn before_send_check_in<F>(mut self, callback: F) -> Self
    where
        F: Fn(Event, Option<&EventHint>) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send_check_in = Some(Arc::new(callback));
        self
    }

    pub fn before_send_metrics<F>(mut self, callback: F) -> Self
    where
        F: Fn(Event, Option<&EventHint>) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send_metrics = Some(Arc::new(callback));
        self
    }

    pub fn default_integrations(mut self, enabled: bool) -> Self {
        self.default_integrations = enabled;
        self
    }

    /// Add a user integration; replaces a default integration of the same type.
    ///
    /// Cannot be combined with [`integrations_customizer`](Self::integrations_customizer):
    /// `build` fails with [`ConfigError::ConflictingIntegrations`].
    pub fn integration(mut self, integration: Arc<dyn Integration>) -> Self {
        match &mut self.integrations {
            Integrations::List(list) => list.push(integration),
            Integrations::Customizer(_) => self.mixed_integrations = true,
        }
        self
    }

    /// Compute the integration list from the defaults instead of appending to them
    pub fn integrations_customizer<F>(mut self, customizer: F) -> Self
    where
        F: Fn(Vec<Arc<dyn Integration>>) -> Vec<Arc<dyn Integration>> + Send + Sync + 'static,
    {
        if matches!(&self.integrations, Integrations::List(list) if !list.is_empty()) {
            self.mixed_integrations = true;
        }
        self.integrations = Integrations::Customizer(Arc::new(customizer));
        self
    }

    pub fn http_compression(mut self, enabled: bool) -> Self {
        self.http_compression = enabled;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Overlay values from `FAULTLINE_*` environment variables
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if let Some(dsn) = env_var("FAULTLINE_DSN") {
            self.dsn = Some(dsn);
        }
        if let Some(release) = env_var("FAULTLINE_RELEASE") {
            self.release = Some(release);
        }
        if let Some(environment) = env_var("FAULTLINE_ENVIRONMENT") {
            self.environment = Some(environment);
        }
        if let Some(server_name) = env_var("FAULTLINE_SERVER_NAME") {
            self.server_name = Some(server_name);
        }
        if let Some(value) = env_var("FAULTLINE_SAMPLE_RATE") {
            self.sample_rate = value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
                name: "FAULTLINE_SAMPLE_RATE",
                value,
            })?;
        }
        if let Some(value) = env_var("FAULTLINE_ATTACH_STACKTRACE") {
            self.attach_stacktrace = parse_env_bool("FAULTLINE_ATTACH_STACKTRACE", value)?;
        }
        Ok(self)
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<Options, ConfigError> {
        if self.mixed_integrations {
            return Err(ConfigError::ConflictingIntegrations);
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.max_breadcrumbs > MAX_BREADCRUMBS {
            return Err(ConfigError::InvalidMaxBreadcrumbs {
                value: self.max_breadcrumbs,
                max: MAX_BREADCRUMBS,
            });
        }

        let dsn = match self.dsn.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(raw.parse::<Dsn>()?),
            _ => None,
        };

        Ok(self.into_options(dsn))
    }

    fn into_options(self, dsn: Option<Dsn>) -> Options {
        Options {
            dsn,
            sample_rate: self.sample_rate,
            attach_stacktrace: self.attach_stacktrace,
            context_lines: self.context_lines,
            release: self.release,
            environment: self.environment,
            server_name: self.server_name,
            dist: self.dist,
            tags: self.tags,
            ignore_exceptions: self.ignore_exceptions,
            exception_hierarchy: self.exception_hierarchy,
            ignore_transactions: self.ignore_transactions,
            in_app_include: self.in_app_include,
            in_app_exclude: self.in_app_exclude,
            prefixes: self.prefixes,
            max_breadcrumbs: self.max_breadcrumbs,
            before_breadcrumb: self.before_breadcrumb,
            before_send: self.before_send,
            before_send_transaction: self.before_send_transaction,
            before_send_check_in: self.before_send_check_in,
            before_send_metrics: self.before_send_metrics,
            default_integrations: self.default_integrations,
            integrations: self.integrations,
            http_compression: self.http_compression,
            http_timeout: self.http_timeout,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert!(options.dsn().is_none());
        assert_eq!(options.sample_rate(), 1.0);
        assert_eq!(options.max_breadcrumbs(), MAX_BREADCRUMBS);
        assert_eq!(options.context_lines(), Some(5));
        assert!(options.default_integrations());
        assert!(!options.attach_stacktrace());
    }

    #[test]
    fn empty_dsn_means_no_dsn() {
        let options = Options::builder().dsn("  ").build().unwrap();
        assert!(options.dsn().is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Options::builder().sample_rate(1.5).build(),
            Err(ConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            Options::builder().sample_rate(f64::NAN).build(),
            Err(ConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            Options::builder().max_breadcrumbs(101).build(),
            Err(ConfigError::InvalidMaxBreadcrumbs { .. })
        ));
        assert!(matches!(
            Options::builder().dsn("https://example.com/1").build(),
            Err(ConfigError::InvalidDsn(_))
        ));
    }

    #[test]
    fn integration_list_and_customizer_conflict() {
        use crate::integrations::EnvironmentIntegration;

        let customizer_first = Options::builder()
            .integrations_customizer(|defaults| defaults)
            .integration(Arc::new(EnvironmentIntegration))
            .build();
        assert!(matches!(
            customizer_first,
            Err(ConfigError::ConflictingIntegrations)
        ));

        let list_first = Options::builder()
            .integration(Arc::new(EnvironmentIntegration))
            .integrations_customizer(|defaults| defaults)
            .build();
        assert!(matches!(list_first, Err(ConfigError::ConflictingIntegrations)));

        assert!(Options::builder()
            .integrations_customizer(|defaults| defaults)
            .build()
            .is_ok());
    }

    #[test]
    fn ignore_matching_uses_short_names_and_hierarchy() {
        let options = Options::builder()
            .ignore_exception("TransientError")
            .exception_subtype("TimeoutError", "TransientError")
            .exception_subtype("ConnectTimeout", "TimeoutError")
            .build()
            .unwrap();

        assert!(options.is_exception_ignored("TransientError"));
        assert!(options.is_exception_ignored("my_app::net::TransientError"));
        assert!(options.is_exception_ignored("ConnectTimeout"));
        assert!(!options.is_exception_ignored("ParseError"));
    }

    #[test]
    fn ignore_exception_type_uses_full_path() {
        let options = Options::builder()
            .ignore_exception_type::<std::fmt::Error>()
            .build()
            .unwrap();
        assert!(options.is_exception_ignored(std::any::type_name::<std::fmt::Error>()));
        assert!(!options.is_exception_ignored("std::io::error::Error"));
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let mut hierarchy = TypeHierarchy::new();
        hierarchy.declare("A", "B");
        hierarchy.declare("B", "A");
        assert_eq!(hierarchy.lineage("A"), vec!["A", "B"]);
        assert!(!hierarchy.is_subtype_of("A", "C"));
    }

    #[test]
    fn short_type_names() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("my_app::Wrapper<alloc::string::String>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
