//! Tracing subscriber setup. Only the binary installs a subscriber.

use anyhow::{bail, Context, Result};

/// Install the global subscriber.
///
/// `TRADESIM_LOG` overrides `log_level` with a full `EnvFilter` directive
/// (e.g. `tradesim_core=debug,info`).
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var("TRADESIM_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .with_context(|| format!("invalid log filter '{filter}'"))?;

    match log_format.trim().to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        "text" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
        other => bail!("unknown log format '{other}' (expected text or json)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let err = init_tracing("info", "xml").unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"), "{err}");
    }
}
