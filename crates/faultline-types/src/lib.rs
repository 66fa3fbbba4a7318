//! Protocol types shared across all Faultline crates
//!
//! This crate holds the data model of a single reportable occurrence (the [`Event`]),
//! the DSN parser and the [`PayloadSerializer`] that renders an event into the
//! newline-delimited envelope format expected by ingestion backends.

pub mod breadcrumb;
pub mod check_in;
pub mod dsn;
pub mod envelope;
pub mod event;
pub mod exception;
pub mod metrics;
pub mod profile;
pub mod stacktrace;
pub mod trace;
pub mod user;
mod payload;
mod utils;

pub use breadcrumb::Breadcrumb;
pub use check_in::{CheckIn, CheckInStatus, MonitorConfig, MonitorSchedule, MonitorScheduleUnit};
pub use dsn::{Dsn, DsnError};
pub use envelope::{ItemType, PayloadSerializer, SerializeError};
pub use event::{Event, EventId, EventKind, Level, SdkMetadata};
pub use exception::{ExceptionDataBag, Mechanism};
pub use metrics::{Metric, MetricValue};
pub use profile::{Profile, ProfileSample};
pub use stacktrace::{Frame, Stacktrace};
pub use trace::{DynamicSamplingContext, Span, SpanId, TraceId};
pub use user::UserDataBag;

/// Identifier reported in the `sdk.name` field of every event
pub const SDK_IDENTIFIER: &str = "faultline.rust";

/// Version reported in the `sdk.version` field of every event
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Value reported in the `platform` field of every event
pub const PLATFORM: &str = "native";

// Re-export external dependencies used in public signatures
pub use chrono;
pub use serde_json;
pub use uuid;
