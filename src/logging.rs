//! Tracing subscriber setup for the binary. Logs go to stderr; stdout carries
//! the generated documents.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Default filter directive for this crate at `level`. `RUST_LOG` directives
/// are applied on top.
pub fn directive(level: Level) -> String {
    format!("text2model={}", level)
}

/// `RUST_LOG` plus the crate directive for `level`.
pub fn filter(level: Level) -> Result<EnvFilter> {
    let directive = directive(level)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid log directive: {}", e)))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init(format: LogFormat, level: Level) -> Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter(level)?);
    let installed = match format {
        LogFormat::Text => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_targets_this_crate() {
        assert_eq!(directive(Level::DEBUG), "text2model=DEBUG");
        assert!(directive(Level::WARN).parse::<tracing_subscriber::filter::Directive>().is_ok());
    }

    #[test]
    fn filter_enables_crate_events_at_level() {
        let subscriber = tracing_subscriber::registry().with(filter(Level::DEBUG).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "text2model::encoder", Level::DEBUG));
        });
    }
}
