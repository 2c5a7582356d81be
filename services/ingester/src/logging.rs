//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Filter from an explicit level or directive string, falling back to
/// `RUST_LOG` and then `info`.
pub fn filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))
        }
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

/// Install the global subscriber. Call once at start-up.
pub fn init(level: Option<&str>, json: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter(level)?)
        .with_target(true);

    if json {
        let subscriber = builder.with_thread_ids(true).json().finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_accepted() {
        assert!(filter(Some("debug")).is_ok());
        assert!(filter(Some("ingestion=debug,storage=warn")).is_ok());
    }

    #[test]
    fn test_bad_directive_rejected() {
        assert!(filter(Some("ingestion=loud")).is_err());
    }
}
