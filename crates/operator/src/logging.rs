//! Structured logging setup.

use std::io::IsTerminal;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
///
/// - `Text`: human-readable (development)
/// - `Json`: one JSON object per event (production)
/// - `Auto`: JSON when stdout is not a terminal, text otherwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    Text,
    /// JSON structured logging.
    Json,
    /// Picks by terminal detection.
    #[default]
    Auto,
}

impl LogFormat {
    /// Whether this format emits JSON when stdout is `is_terminal`.
    pub fn use_json(self, is_terminal: bool) -> bool {
        match self {
            Self::Json => true,
            Self::Text => false,
            Self::Auto => !is_terminal,
        }
    }
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Call once per
/// process; later calls panic inside `tracing-subscriber`.
pub fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if format.use_json(std::io::stdout().is_terminal()) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection() {
        assert!(LogFormat::Json.use_json(true));
        assert!(!LogFormat::Text.use_json(false));
        assert!(LogFormat::Auto.use_json(false));
        assert!(!LogFormat::Auto.use_json(true));
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Auto);
    }
}
