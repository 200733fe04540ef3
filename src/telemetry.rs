use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Failures while wiring up diagnostics for a report run.
#[derive(Debug)]
pub enum TelemetryError {
    /// `APP_LOG_LEVEL` could not be read as a tracing filter directive.
    InvalidDirective { directive: String, source: ParseError },
    /// Another subscriber already owns the global dispatcher.
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidDirective { directive, source } => write!(
                f,
                "APP_LOG_LEVEL '{directive}' is not a valid log filter ({source})"
            ),
            TelemetryError::Install(err) => {
                write!(f, "could not install the stderr log subscriber: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidDirective { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(err.as_ref()),
        }
    }
}

/// Installs the global subscriber. Diagnostics go to stderr so stdout only
/// carries the printed report.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|source| {
            TelemetryError::InvalidDirective {
                directive: config.log_level.clone(),
                source,
            }
        }),
    }
}
