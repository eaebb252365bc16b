//! CLI entry point for sessvar.
//!
//! Every command follows the same pipeline: open the store, prepare it
//! (validate, initializing a fresh file), resolve the session, then read
//! or write. Any failure ends the process with a non-zero status; logs go
//! to stderr so stdout only ever carries command output.

mod cli;
mod config;
mod helpers;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use sessvar_store::{PreparedStore, Store, StoreConfig, Validity};
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::helpers::{init_tracing, level_for_verbosity, render_sessions, render_variables};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(level_for_verbosity(cli.verbose));

    let Some(db) = cli.db.as_deref() else {
        bail!("no store specified; pass --db <file> or set SESSVAR_DB");
    };
    let config = config::load_store_config(cli.config.as_deref(), cli.schema_version.as_deref())?;

    let output = run(cli.command, db, config).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("failed to write output")?;
    stdout.flush().context("failed to write output")?;
    Ok(())
}

/// Execute one command and return what should be printed on stdout.
async fn run(command: Commands, db: &Path, config: StoreConfig) -> Result<String> {
    match command {
        Commands::Get { session, var } => {
            let store = open_prepared(db, config).await?;
            let id = store.resolve_session_id(&session.session).await?;
            debug!(session = %session.session, session_id = %id, "session resolved");

            let value = store.get(id, &var).await?;
            if value.is_none() {
                info!(var = %var, session = %session.session, "variable not set");
            }
            Ok(format!("{}\n", value.unwrap_or_default()))
        }

        Commands::Set {
            session,
            var,
            value,
        } => {
            let store = open_prepared(db, config).await?;
            let id = store.resolve_session_id(&session.session).await?;
            debug!(session = %session.session, session_id = %id, "session resolved");

            store.set(id, &var, &value).await?;
            info!(var = %var, session = %session.session, "variable set");
            Ok(String::new())
        }

        Commands::Unset { session, var } => {
            let store = open_prepared(db, config).await?;
            if let Some(entry) = store.find_session(&session.session).await? {
                let removed = store.unset(entry.id, &var).await?;
                info!(var = %var, session = %session.session, removed, "variable unset");
            }
            Ok(String::new())
        }

        Commands::Sessions { format } => {
            let store = open_prepared(db, config).await?;
            let sessions = store.list_sessions().await?;
            render_sessions(&sessions, format.json)
        }

        Commands::Vars { session, format } => {
            let store = open_prepared(db, config).await?;
            let vars = match store.find_session(&session.session).await? {
                Some(entry) => store.list_variables(entry.id).await?,
                None => Vec::new(),
            };
            render_variables(&vars, format.json)
        }

        Commands::Check => {
            let store = Store::open_read_only(db, config)
                .with_context(|| format!("cannot open store {}", db.display()))?;
            match store.classify().await? {
                Validity::Empty => Ok("empty\n".to_string()),
                Validity::Valid => {
                    let mut out = String::from("valid\n");
                    for entry in store.meta_entries().await? {
                        out.push_str(&format!("{}\t{}\n", entry.key, entry.value));
                    }
                    Ok(out)
                }
                Validity::Invalid(reason) => bail!("store {} is invalid: {reason}", db.display()),
            }
        }

        Commands::Init => {
            open_prepared(db, config).await?;
            Ok(String::new())
        }
    }
}

fn open(db: &Path, config: StoreConfig) -> Result<Store> {
    info!(path = %db.display(), "using store");
    Store::open(db, config).with_context(|| format!("cannot open store {}", db.display()))
}

async fn open_prepared(db: &Path, config: StoreConfig) -> Result<PreparedStore> {
    let store = open(db, config)?;
    store
        .prepare()
        .await
        .with_context(|| format!("cannot prepare store {}", db.display()))
}
