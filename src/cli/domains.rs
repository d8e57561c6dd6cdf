//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了域列表命令的实现。

use crate::cli::DomainsArgs;
use crate::manager::CacheManager;
use anyhow::Result;

pub fn execute(manager: &CacheManager, args: &DomainsArgs) -> Result<()> {
    let registry = manager.registry();
    println!("=== Cache Domains ({}) ===\n", registry.len());

    if registry.is_empty() {
        println!("No cache domains registered.");
        return Ok(());
    }

    for entry in registry.entries() {
        let d = entry.descriptor();
        let mut flags = Vec::new();
        if d.composite {
            flags.push("composite");
        }
        if d.scoped {
            flags.push("scoped");
        }
        if !entry.is_preheatable() {
            flags.push("no-source");
        }

        if args.verbose {
            println!(
                "{:<28} backend={:<12} prefix={:<36} {}",
                d.name,
                d.backend,
                d.key_prefix,
                flags.join(",")
            );
        } else {
            println!("{}", d.name);
        }
    }

    Ok(())
}
