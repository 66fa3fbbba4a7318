//! Client, scope and integration pipeline of the Faultline SDK
//!
//! ## Architecture
//!
//! ```text
//! Client::capture_*
//!     ↓
//! prepare_event (exceptions, stacktrace, defaults, sampling, ignore lists)
//!     ↓
//! Scope::apply_to_event (scope data, global + scope processors), or only the global
//! processors when no scope is given
//!     ↓
//! before_send callback for the event kind
//!     ↓
//! Transport::send
//! ```

pub mod client;
pub mod error;
pub mod hint;
pub mod integrations;
pub mod last_error;
pub mod options;
pub mod scope;
pub mod stacktrace_builder;
pub mod transport;
mod captured_error;

pub use captured_error::CapturedError;
pub use client::{Client, ClientBuilder};
pub use error::ConfigError;
pub use hint::EventHint;
pub use integrations::{
    default_integrations, EnvironmentIntegration, FrameContextIntegration, Integration,
    IntegrationRegistry, Integrations, IntegrationsCustomizer, OptionAware, PanicIntegration,
};
pub use last_error::{clear_last_error, last_error, record_last_error, ErrorRecord};
pub use options::{BreadcrumbCallback, EventCallback, Options, OptionsBuilder, TypeHierarchy};
pub use scope::{EventProcessor, PropagationContext, Scope};
pub use stacktrace_builder::{RawFrame, StacktraceBuilder};
pub use transport::{NullTransport, ResultStatus, Transport, TransportError, TransportResult};

// Re-export the protocol types so most users only depend on this crate
pub use faultline_types as types;
pub use faultline_types::{Event, EventId, EventKind, Level};
