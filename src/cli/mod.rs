//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::Config;
use crate::manager::CacheManager;
use crate::telemetry::init_tracing;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cache-manager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        default_value = "cache-manager.toml",
        help = "Path to the TOML config file"
    )]
    pub config: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log filter used when RUST_LOG is unset"
    )]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "domains", about = "List registered cache domains")]
    Domains(DomainsArgs),

    #[command(name = "info", about = "Show cached and source counts per domain")]
    Info(InfoArgs),

    #[command(name = "entries", about = "List cached entries of a domain")]
    Entries(EntriesArgs),

    #[command(name = "invalidate", about = "Invalidate one or more domains")]
    Invalidate(InvalidateArgs),

    #[command(name = "preheat", about = "Load live entities of a domain into the cache")]
    Preheat(PreheatArgs),
}

#[derive(Parser, Debug)]
pub struct DomainsArgs {
    #[arg(short, long, help = "Show backend and key prefix")]
    pub verbose: bool,
}

mod admin;
mod domains;
mod info;

pub use admin::{InvalidateArgs, PreheatArgs};
pub use info::{EntriesArgs, InfoArgs};

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("cache-manager", &cli.log);

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config '{}'", cli.config.display()))?;
    let manager = CacheManager::connect(config)
        .await
        .context("Failed to initialize cache manager")?;

    match &cli.command {
        Commands::Domains(args) => domains::execute(&manager, args),
        Commands::Info(args) => info::execute(&manager, args).await,
        Commands::Entries(args) => info::execute_entries(&manager, args).await,
        Commands::Invalidate(args) => admin::execute_invalidate(&manager, args).await,
        Commands::Preheat(args) => admin::execute_preheat(&manager, args).await,
    }
}
