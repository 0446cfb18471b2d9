//! Cache command - inspect and clear the local build cache

use crate::cache::{format_bytes, CacheEntry, CacheKeySet, LocalCacheStore};
use crate::catalog::VersionCatalog;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::ProvisionResult;
use crate::platform::PlatformFingerprint;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ProvisionResult<()> {
    let store = LocalCacheStore::new(config.cache.dir.clone());

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Keys { token } => show_keys(config, &token).await,
        CacheAction::Clear { key } => clear_entries(&store, key.as_deref()).await,
    }
}

async fn list_entries(store: &LocalCacheStore, format: OutputFormat) -> ProvisionResult<()> {
    let entries = store.list().await?;

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(
                    &ctx,
                    &format!("No cache entries in {}", store.root().display()),
                );
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<56} {:>10} {:<20}",
        style("KEY").bold(),
        style("SIZE").bold(),
        style("CREATED").bold()
    );
    println!("{}", "-".repeat(88));

    let mut total = 0;
    for entry in entries {
        total += entry.size_bytes;
        println!(
            "{:<56} {:>10} {:<20}",
            entry.key,
            format_bytes(entry.size_bytes),
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} entr(ies), {}", entries.len(), format_bytes(total));
}

/// Print the keys an install of `token` would look up, most specific first
async fn show_keys(config: &Config, token: &str) -> ProvisionResult<()> {
    let catalog = VersionCatalog::load(config.catalog.path.as_deref()).await?;
    let version = catalog.resolve(token)?;
    let fingerprint = PlatformFingerprint::detect().await;

    for key in CacheKeySet::derive(version, &fingerprint).iter() {
        println!("{}", key);
    }
    Ok(())
}

async fn clear_entries(store: &LocalCacheStore, key: Option<&str>) -> ProvisionResult<()> {
    let ctx = UiContext::detect();

    match key {
        Some(key) => {
            if store.remove(key).await? {
                ui::step_ok_detail(&ctx, "Removed cache entry", key);
            } else {
                ui::step_warn_hint(
                    &ctx,
                    &format!("No cache entry {}", key),
                    "Run: setup-vapoursynth cache list",
                );
            }
        }
        None => {
            let removed = store.clear().await?;
            ui::step_ok(&ctx, &format!("Removed {} cache entr(ies)", removed));
        }
    }

    Ok(())
}
