//! Configuration errors
//!
//! Runtime conditions (sampling, ignore lists, vetoes, transport failures) never
//! surface as errors; only a broken configuration does.

use faultline_types::DsnError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid DSN: {0}")]
    InvalidDsn(#[from] DsnError),

    #[error("Sample rate must be between 0.0 and 1.0, got {0}")]
    InvalidSampleRate(f64),

    #[error("max_breadcrumbs must be at most {max}, got {value}")]
    InvalidMaxBreadcrumbs { value: usize, max: usize },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnvVar { name: &'static str, value: String },

    #[error("Integration '{0}' is returned more than once by the integrations customizer")]
    DuplicateIntegration(&'static str),

    #[error("Integrations can be given as a list or through a customizer, not both")]
    ConflictingIntegrations,
}
