//! docweave - incremental build orchestrator for file-backed documentation.

#![allow(dead_code)]

mod cache;
mod cli;
mod collab;
mod config;
mod core;
mod entities;
mod entity;
mod error;
mod freshness;
mod global;
mod lifecycle;
mod logger;
mod orchestrator;
mod utils;
mod watcher;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let cwd = std::env::current_dir().context("failed to get current working directory")?;
    let mut config = ProjectConfig::load(&cwd, &cli.config)?;
    config.build.clean = cli.clean();

    match &cli.command {
        Commands::Build { .. } => cli::build::build_project(&config).map(|_| ()),
        Commands::Watch { .. } => cli::watch::watch_project(&config),
        Commands::Clean => cli::clean::clean_project(&config),
    }
}
