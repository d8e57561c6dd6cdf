//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存内省命令的实现。

use crate::introspection::{CacheInfoPage, Pagination};
use crate::manager::CacheManager;
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[arg(short, long, help = "Only show this domain")]
    pub domain: Option<String>,

    #[arg(long, help = "Return at most N domains from the start of the window")]
    pub first: Option<usize>,

    #[arg(long, help = "Return at most N domains from the end of the window")]
    pub last: Option<usize>,

    #[arg(long, help = "Start after this domain cursor")]
    pub after: Option<String>,

    #[arg(long, help = "End before this domain cursor")]
    pub before: Option<String>,

    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct EntriesArgs {
    #[arg(short, long, help = "Domain name")]
    pub domain: String,

    #[arg(short, long, default_value_t = 100, help = "Maximum number of entries")]
    pub limit: usize,
}

pub async fn execute(manager: &CacheManager, args: &InfoArgs) -> Result<()> {
    let pagination = Pagination {
        first: args.first,
        last: args.last,
        after: args.after.clone(),
        before: args.before.clone(),
    };
    let page = manager
        .list_info(args.domain.as_deref(), &pagination)
        .await
        .context("Failed to collect cache info")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print_page(&page);
    }
    Ok(())
}

pub async fn execute_entries(manager: &CacheManager, args: &EntriesArgs) -> Result<()> {
    let entries = manager
        .list_entries(&args.domain, Some(args.limit))
        .await
        .with_context(|| format!("Failed to list entries of '{}'", args.domain))?;

    println!("=== Cached entries of '{}' ===\n", args.domain);
    for entry in &entries {
        println!("{:<16} {}", entry.id, entry.key);
    }
    println!("\n{} entries shown", entries.len());
    Ok(())
}

fn print_page(page: &CacheInfoPage) {
    println!("=== Cache Info ===\n");
    println!("{:<28} {:<12} {:>12} {:>12}", "DOMAIN", "BACKEND", "CACHED", "SOURCE");
    for edge in &page.edges {
        let node = &edge.node;
        println!(
            "{:<28} {:<12} {:>12} {:>12}",
            node.domain, node.backend, node.cached_count, node.source_count
        );
    }
    println!();
    println!("Total domains:   {}", page.total_count);
    println!("Has next page:   {}", page.page_info.has_next_page);
    println!("Has prev page:   {}", page.page_info.has_previous_page);
    if let Some(cursor) = &page.page_info.end_cursor {
        println!("End cursor:      {}", cursor);
    }
}
