//! CLI argument definitions for sessvar.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// sessvar -- per-session variables in a versioned SQLite store.
#[derive(Parser)]
#[command(
    name = "sessvar",
    version,
    about = "Get and set per-session variables in a versioned SQLite store",
    long_about = "Stores string variables under named sessions. The store file carries a \
                  schema version marker and is refused when the marker is missing or does \
                  not match."
)]
pub struct Cli {
    /// Store file to use. There is no default location.
    #[arg(long, env = "SESSVAR_DB", global = true)]
    pub db: Option<PathBuf>,

    /// TOML configuration file with a `[store]` table.
    #[arg(long, env = "SESSVAR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Expected schema version, overriding the configuration file.
    #[arg(long, global = true)]
    pub schema_version: Option<String>,

    /// Increase log verbosity on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the value of a variable (an empty line if it is unset).
    Get {
        #[command(flatten)]
        session: SessionArg,
        /// Variable name.
        var: String,
    },

    /// Set a variable, creating the session if needed.
    Set {
        #[command(flatten)]
        session: SessionArg,
        /// Variable name.
        var: String,
        /// New value.
        value: String,
    },

    /// Remove a variable.
    Unset {
        #[command(flatten)]
        session: SessionArg,
        /// Variable name.
        var: String,
    },

    /// List all sessions.
    Sessions {
        #[command(flatten)]
        format: FormatArg,
    },

    /// List the variables of a session.
    Vars {
        #[command(flatten)]
        session: SessionArg,
        #[command(flatten)]
        format: FormatArg,
    },

    /// Classify the store as empty, valid, or invalid without changing it.
    Check,

    /// Create or validate the store.
    Init,
}

#[derive(Args)]
pub struct SessionArg {
    /// Session name.
    #[arg(long, short)]
    pub session: String,
}

#[derive(Args)]
pub struct FormatArg {
    /// Print JSON instead of tab-separated lines.
    #[arg(long)]
    pub json: bool,
}
