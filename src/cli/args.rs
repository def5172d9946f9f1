//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

/// docweave incremental documentation builder
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: docweave.toml)
    #[arg(short = 'C', long, global = true, default_value = crate::config::CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan the entity roots and build once
    #[command(visible_alias = "b")]
    Build {
        /// Remove output and cache before building
        #[arg(short, long)]
        clean: bool,
    },

    /// Build, then rebuild on every change until Ctrl+C
    #[command(visible_alias = "w")]
    Watch {
        /// Remove output and cache before the first pass
        #[arg(short, long)]
        clean: bool,
    },

    /// Remove the output directory and the cache
    Clean,
}

impl Cli {
    /// Whether the command asks for a clean start.
    pub fn clean(&self) -> bool {
        match self.command {
            Commands::Build { clean } | Commands::Watch { clean } => clean,
            Commands::Clean => false,
        }
    }
}
