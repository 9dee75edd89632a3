mod artifact;
mod config;
mod db;
mod error;
mod extract;
mod fetch;
mod merge;
mod normalize;
mod pipeline;
mod record;
mod report;
mod views;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};

use crate::config::Settings;
use crate::record::Record;

#[derive(Parser)]
#[command(name = "county_chairs", about = "County party chair directory builder")]
struct Cli {
    /// Source registry and settings file
    #[arg(long, global = true, env = "CHAIRS_CONFIG", default_value = "sources.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and extract sources, merge into the artifact, print the report
    Run {
        /// Only these sources (default: all registered)
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Extract one source into a dataset file
    Extract {
        #[arg(long)]
        source: String,
        /// Read raw input from this file instead of fetching
        #[arg(long)]
        input: Option<PathBuf>,
        /// Dataset output path (default: <dataset_dir>/<source>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge dataset files, in the order given, into the artifact
    Merge {
        #[arg(required = true)]
        datasets: Vec<PathBuf>,
        #[arg(long)]
        artifact: Option<PathBuf>,
    },
    /// Completeness report of the artifact
    Report {
        /// Per-jurisdiction breakdown
        #[arg(long)]
        detail: bool,
    },
    /// Jurisdictions with record counts
    States,
    /// Records of one jurisdiction, or a single record by id
    Show {
        /// Two-letter code (OH) or record id (OH-adams-county)
        code: String,
    },
    /// Search person, subdivision and jurisdiction names
    Search {
        query: String,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Look for embedded JSON payloads in a page
    #[command(group(ArgGroup::new("target").required(true).args(["source", "input"])))]
    Probe {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Write the artifact into SQLite
    ExportSqlite {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;

    let result = match cli.command {
        Commands::Run { sources } => {
            let outcome = pipeline::run(&settings, &sources).await?;
            println!(
                "Fetched {} sources ({} ok, {} unavailable)",
                outcome.fetch.total, outcome.fetch.ok, outcome.fetch.unavailable
            );
            for (name, count) in &outcome.datasets {
                println!("  {:<28} {:>5} records", name, count);
            }
            println!(
                "Merged {} records: {} inserted, {} replaced, {} unchanged",
                outcome.merge.touched(),
                outcome.merge.inserted,
                outcome.merge.replaced,
                outcome.merge.unchanged
            );
            println!();
            print!("{}", report::render(&outcome.stats, false));
            Ok(())
        }
        Commands::Extract { source, input, out } => {
            let source_cfg = settings.source(&source)?.clone();
            let body = match &input {
                Some(path) => Some(
                    std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?,
                ),
                None => {
                    let (mut bodies, _) = fetch::fetch_all(&settings.fetch, &[&source_cfg]).await?;
                    bodies.pop().flatten()
                }
            };
            let datasets =
                pipeline::extract_all(&settings, &[&source_cfg], &[body], Utc::now().date_naive());
            let out = out.unwrap_or_else(|| pipeline::dataset_path(&settings, &source));
            for dataset in &datasets {
                artifact::save_dataset(&out, dataset)?;
                println!("{} records from {} -> {}", dataset.len(), source, out.display());
            }
            Ok(())
        }
        Commands::Merge { datasets, artifact } => {
            if let Some(path) = artifact {
                settings.artifact = path;
            }
            let (summary, stats) = pipeline::merge_files(&settings, &datasets)?;
            println!(
                "Merged {} datasets: {} inserted, {} replaced, {} unchanged -> {}",
                datasets.len(),
                summary.inserted,
                summary.replaced,
                summary.unchanged,
                settings.artifact.display()
            );
            print!("{}", report::render(&stats, false));
            Ok(())
        }
        Commands::Report { detail } => {
            let collection = artifact::load_collection(&settings.artifact)?;
            if collection.is_empty() {
                println!("No records in {}.", settings.artifact.display());
                return Ok(());
            }
            let stats = report::report(&collection, &settings.jurisdictions);
            print!("{}", report::render(&stats, detail));
            Ok(())
        }
        Commands::States => {
            let collection = artifact::load_collection(&settings.artifact)?;
            let rows = views::jurisdictions(&collection);
            if rows.is_empty() {
                println!("No records. Run 'run' or 'merge' first.");
                return Ok(());
            }
            println!("{:<4} | {:<22} | {:>7} | {:>8}", "Code", "Jurisdiction", "Records", "Resolved");
            println!("{}", "-".repeat(50));
            for r in &rows {
                println!(
                    "{:<4} | {:<22} | {:>7} | {:>8}",
                    r.code,
                    truncate(&r.name, 22),
                    r.records,
                    r.resolved
                );
            }
            println!("\n{} jurisdictions", rows.len());
            Ok(())
        }
        Commands::Show { code } => {
            let collection = artifact::load_collection(&settings.artifact)?;
            if let Some(record) = collection.get(code.trim()) {
                print_records(&[record]);
                return Ok(());
            }
            let records = views::by_jurisdiction(&collection, &code);
            if records.is_empty() {
                println!("No records for {}.", code.to_uppercase());
                return Ok(());
            }
            print_records(&records);
            Ok(())
        }
        Commands::Search { query, limit } => {
            let collection = artifact::load_collection(&settings.artifact)?;
            let hits = views::search(&collection, &query);
            if hits.is_empty() {
                println!("No matches for '{}'.", query);
                return Ok(());
            }
            let shown: Vec<&Record> = hits.iter().take(limit).copied().collect();
            print_records(&shown);
            if hits.len() > shown.len() {
                println!("({} more not shown)", hits.len() - shown.len());
            }
            Ok(())
        }
        Commands::Probe { source, input } => {
            let (label, markers, body) = match (source, input) {
                (Some(name), _) => {
                    let cfg = settings.source(&name)?.clone();
                    let (mut bodies, _) = fetch::fetch_all(&settings.fetch, &[&cfg]).await?;
                    let body = bodies
                        .pop()
                        .flatten()
                        .with_context(|| format!("source '{}' unavailable", name))?;
                    (name, cfg.markers.clone(), body)
                }
                (None, Some(path)) => {
                    let body = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    (path.display().to_string(), Vec::new(), body)
                }
                (None, None) => anyhow::bail!("probe needs --source or --input"),
            };
            let probe = extract::payload::probe(&body, &markers);
            println!("{}: {} bytes", label, probe.bytes);
            match &probe.payload {
                Some(hit) => println!("  payload: {} -> {}", hit.marker, hit.shape),
                None => println!("  payload: none"),
            }
            if !probe.malformed.is_empty() {
                println!("  unparseable: {}", probe.malformed.join(", "));
            }
            for url in probe.api_urls.iter().take(10) {
                println!("  api: {}", url);
            }
            Ok(())
        }
        Commands::ExportSqlite { db } => {
            let path = db
                .or_else(|| settings.sqlite.clone())
                .unwrap_or_else(|| PathBuf::from("data/county-chairs.sqlite"));
            let collection = artifact::load_collection(&settings.artifact)?;
            let stats = report::report(&collection, &settings.jurisdictions);
            let rows = pipeline::export_sqlite(&path, &collection, &stats)?;
            let conn = db::connect(&path)?;
            let coverage = db::fetch_coverage(&conn)?;
            let resolved: usize = coverage.iter().map(|c| c.resolved).sum();
            println!(
                "Exported {} records ({} resolved) across {} jurisdictions to {}",
                rows,
                resolved,
                coverage.len(),
                path.display()
            );
            for c in &coverage {
                println!("  {:<4} {:>4}/{:<4}", c.code, c.resolved, c.records);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_records(records: &[&Record]) {
    println!(
        "{:<24} | {:<24} | {:<28} | {:<14} | {:<4}",
        "Subdivision", "Chair", "Email", "Phone", "Flag"
    );
    println!("{}", "-".repeat(106));
    for r in records {
        println!(
            "{:<24} | {:<24} | {:<28} | {:<14} | {:<4}",
            truncate(&r.subdivision_name, 24),
            truncate(r.person_name.as_str(), 24),
            truncate(r.email.as_deref().unwrap_or("-"), 28),
            r.phone.as_deref().unwrap_or("-"),
            if r.needs_verification() { "!" } else { "" }
        );
    }
    println!("\n{} records", records.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn probe_requires_a_target() {
        assert!(Cli::try_parse_from(["county_chairs", "probe"]).is_err());
        assert!(Cli::try_parse_from(["county_chairs", "probe", "--input", "page.html"]).is_ok());
    }

    #[test]
    fn repeated_source_flags() {
        let cli = Cli::try_parse_from([
            "county_chairs", "run", "--source", "ohio", "--source", "kansas-list",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { sources } => assert_eq!(sources, vec!["ohio", "kansas-list"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate("Adams County", 24), "Adams County");
        assert_eq!(truncate("Prince George's County Republican", 12), "Prince Ge...");
    }
}
