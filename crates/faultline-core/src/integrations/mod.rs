//! Pluggable, one-time-initialised enrichers of the capture pipeline

mod environment;
mod frame_context;
mod panic;

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::ConfigError;
use crate::options::Options;

pub use environment::EnvironmentIntegration;
pub use frame_context::FrameContextIntegration;
pub use panic::PanicIntegration;

/// An integration hooks into the process once, typically by registering a global
/// event processor or a runtime hook.
pub trait Integration: Any + Send + Sync {
    /// Human readable name used in logs
    fn name(&self) -> &'static str;

    /// Install the integration. Runs at most once per type and registry.
    fn setup_once(&self);

    fn as_any(&self) -> &dyn Any;

    /// Integrations that need the client options before setup expose them here
    fn as_option_aware(&self) -> Option<&dyn OptionAware> {
        None
    }
}

/// Capability of receiving the client options before `setup_once`
pub trait OptionAware {
    fn set_options(&self, options: Arc<Options>);
}

/// Concrete type identity of an integration object
pub(crate) fn integration_type_id(integration: &dyn Integration) -> TypeId {
    integration.as_any().type_id()
}

pub type IntegrationsCustomizer =
    Arc<dyn Fn(Vec<Arc<dyn Integration>>) -> Vec<Arc<dyn Integration>> + Send + Sync>;

/// User supplied integrations
#[derive(Clone)]
pub enum Integrations {
    /// Added to the defaults, replacing defaults of the same type
    List(Vec<Arc<dyn Integration>>),
    /// Computes the final list from the defaults
    Customizer(IntegrationsCustomizer),
}

impl Default for Integrations {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl fmt::Debug for Integrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(list) => f
                .debug_list()
                .entries(list.iter().map(|integration| integration.name()))
                .finish(),
            Self::Customizer(_) => f.write_str("Customizer(<function>)"),
        }
    }
}

/// The integrations installed unless `default_integrations` is off
pub fn default_integrations() -> Vec<Arc<dyn Integration>> {
    vec![
        Arc::new(EnvironmentIntegration),
        Arc::new(FrameContextIntegration::new()),
        Arc::new(PanicIntegration),
    ]
}

/// Tracks which integration types have been installed
///
/// Create one per application and hand it to every client that should share
/// installation state.
pub struct IntegrationRegistry {
    installed: Mutex<HashSet<TypeId>>,
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self {
            installed: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_installed(&self, type_id: TypeId) -> bool {
        self.installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&type_id)
    }

    /// Install every effective integration whose type was never installed here.
    ///
    /// Returns the effective integrations of this call keyed by type, including the
    /// ones an earlier call already installed.
    pub fn setup_integrations(
        &self,
        options: &Arc<Options>,
    ) -> Result<IndexMap<TypeId, Arc<dyn Integration>>, ConfigError> {
        let integrations = Self::integrations_to_setup(options)?;

        // held for the whole loop so concurrent callers cannot both run a hook
        let mut installed = self
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut effective = IndexMap::with_capacity(integrations.len());
        let mut newly_installed = Vec::new();

        for integration in integrations {
            let type_id = integration_type_id(integration.as_ref());
            if installed.insert(type_id) {
                if let Some(option_aware) = integration.as_option_aware() {
                    option_aware.set_options(Arc::clone(options));
                }
                integration.setup_once();
                newly_installed.push(integration.name());
            }
            effective.insert(type_id, integration);
        }

        if !newly_installed.is_empty() {
            debug!(
                integrations = ?newly_installed,
                "The {} integrations have been installed",
                newly_installed.join(", ")
            );
        }

        Ok(effective)
    }

    fn integrations_to_setup(options: &Options) -> Result<Vec<Arc<dyn Integration>>, ConfigError> {
        match options.integrations() {
            Integrations::List(user_integrations) => {
                let user_types: HashSet<TypeId> = user_integrations
                    .iter()
                    .map(|integration| integration_type_id(integration.as_ref()))
                    .collect();

                let defaults = if options.default_integrations() {
                    default_integrations()
                } else {
                    Vec::new()
                };

                let mut seen = HashSet::new();
                Ok(defaults
                    .into_iter()
                    .filter(|integration| !user_types.contains(&integration_type_id(integration.as_ref())))
                    .chain(user_integrations.iter().cloned())
                    .filter(|integration| seen.insert(integration_type_id(integration.as_ref())))
                    .collect())
            }
            Integrations::Customizer(customizer) => {
                let integrations = customizer(default_integrations());
                let mut seen = HashSet::new();
                for integration in &integrations {
                    if !seen.insert(integration_type_id(integration.as_ref())) {
                        return Err(ConfigError::DuplicateIntegration(integration.name()));
                    }
                }
                Ok(integrations)
            }
        }
    }
}

impl fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed = self
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("IntegrationRegistry")
            .field("installed", &installed)
            .finish()
    }
}
