//! Versions command - list the version catalog

use crate::catalog::VersionCatalog;
use crate::cli::args::{OutputFormat, VersionsArgs};
use crate::config::Config;
use crate::error::ProvisionResult;
use console::style;
use serde::Serialize;

#[derive(Serialize)]
struct VersionRow<'a> {
    name: &'a str,
    vs_ref: &'a str,
    zimg_ref: &'a str,
    minor: &'a str,
    aliases: Vec<&'a str>,
}

/// Execute the versions command
pub async fn execute(args: VersionsArgs, config: &Config) -> ProvisionResult<()> {
    let catalog = VersionCatalog::load(config.catalog.path.as_deref()).await?;

    let rows: Vec<VersionRow<'_>> = catalog
        .versions()
        .map(|(name, v)| VersionRow {
            name,
            vs_ref: &v.vs_ref,
            zimg_ref: &v.zimg_ref,
            minor: &v.minor,
            aliases: catalog.aliases_for(name),
        })
        .collect();

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

fn print_table(rows: &[VersionRow<'_>]) {
    println!(
        "{:<8} {:<14} {:<16} {:<20}",
        style("NAME").bold(),
        style("VAPOURSYNTH").bold(),
        style("ZIMG").bold(),
        style("ALIASES").bold()
    );
    println!("{}", "-".repeat(60));

    for row in rows {
        println!(
            "{:<8} {:<14} {:<16} {:<20}",
            row.name,
            row.vs_ref,
            row.zimg_ref,
            row.aliases.join(", ")
        );
    }

    println!();
    println!("{} version(s)", rows.len());
}
