//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了失效和预热命令的实现。

use crate::manager::CacheManager;
use crate::source::ActorId;
use crate::sync::InvalidationMode;
use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    #[arg(required = true, help = "Domain names (case-insensitive)")]
    pub domains: Vec<String>,

    #[arg(short = 'y', long = "yes", help = "Skip confirmation")]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct PreheatArgs {
    #[arg(short, long, help = "Domain name")]
    pub domain: String,

    #[arg(short, long, help = "Actor id used by scoped domains")]
    pub actor: String,
}

pub async fn execute_invalidate(manager: &CacheManager, args: &InvalidateArgs) -> Result<()> {
    if !args.yes {
        println!("Preparing to invalidate:");
        for name in &args.domains {
            println!("  - {}", name);
        }
        print!("\nDo you want to continue? [y/N]: ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim().to_lowercase() != "y" {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    match manager.invalidate(&args.domains).await {
        Ok(reports) => {
            for report in reports {
                match (report.mode, report.deleted) {
                    (InvalidationMode::NamespaceClear, _) => {
                        println!("✅ {}: namespace cleared", report.domain)
                    }
                    (InvalidationMode::PrefixScan, deleted) => println!(
                        "✅ {}: {} keys deleted",
                        report.domain,
                        deleted.unwrap_or(0)
                    ),
                }
            }
            Ok(())
        }
        Err(failures) => {
            for (name, err) in &failures {
                println!("❌ {}: {}", name, err);
            }
            bail!("{} domain(s) failed to invalidate", failures.len())
        }
    }
}

pub async fn execute_preheat(manager: &CacheManager, args: &PreheatArgs) -> Result<()> {
    println!("Preheating domain: {}...", args.domain);
    let actor = ActorId::new(args.actor.clone());
    let report = manager
        .preheat(&args.domain, &actor)
        .await
        .with_context(|| format!("Failed to preheat '{}'", args.domain))?;

    println!(
        "✅ {} keys written in {} batches",
        report.written, report.batches
    );
    if let Some(actor) = report.scoped_to {
        println!("Scoped to actor: {}", actor);
    }
    Ok(())
}
