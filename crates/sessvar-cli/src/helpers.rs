//! Shared helpers: tracing setup and output formatting.

use anyhow::Result;
use serde::Serialize;
use sessvar_store::{SessionEntry, VariableEntry};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Map `-v` occurrences to a default filter level.
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Initialize the tracing subscriber on stderr. `RUST_LOG` wins over
/// `default_level`. Stdout is reserved for command output.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

pub fn render_sessions(sessions: &[SessionEntry], json: bool) -> Result<String> {
    if json {
        return to_json(sessions);
    }
    Ok(sessions
        .iter()
        .map(|s| format!("{}\t{}\n", s.id, s.name))
        .collect())
}

pub fn render_variables(vars: &[VariableEntry], json: bool) -> Result<String> {
    if json {
        return to_json(vars);
    }
    Ok(vars
        .iter()
        .map(|v| format!("{}\t{}\n", v.name, v.value))
        .collect())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}
