use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    Filter { directives: String, source: ParseError },
    Init(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directives, .. } => {
                write!(f, "invalid log filter directives '{directives}'")
            }
            TelemetryError::Init(err) => write!(f, "tracing init failed: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Init(err) => Some(&**err),
        }
    }
}

/// Expand the configured level into full directives. Provider HTTP chatter
/// stays at warn so campaign sends do not drown the dispatch spans.
fn filter_directives(config: &TelemetryConfig) -> String {
    format!("{},hyper=warn,tower=warn", config.log_level)
}

/// Install the global subscriber. An explicit `RUST_LOG` wins over the
/// configured level; either source must parse or startup aborts.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| filter_directives(config));
    let filter = EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter {
        directives,
        source,
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Init)
}
