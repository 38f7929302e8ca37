//! Nodwatch command line
//!
//! Usage:
//!   nodwatch init --dir ./data
//!   nodwatch check --dir ./data
//!   nodwatch search --dir ./data --seed posts.jsonl post "clinic visit"
//!   nodwatch reindex --dir ./data --seed posts.jsonl post

mod seed;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nodwatch::{Nodwatch, NodwatchConfig, Record, CONFIG_FILE_NAME};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nodwatch")]
#[command(about = "Patient tracking data core with commit-synchronized search")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default nodwatch.toml if none exists
    Init {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Parse and validate nodwatch.toml
    Check {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Load seed records, then run a ranked search
    Search {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// JSON-lines file of records to load first
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Entity type to search, e.g. post or waypoint
        entity_type: String,
        query: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Defaults to search.per_page
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Load seed records, then rebuild the index
    Reindex {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Only this type; every searchable type if omitted
        entity_type: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init { dir } => init(&dir),
        Command::Check { dir } => check(&dir),
        Command::Search {
            dir,
            seed,
            entity_type,
            query,
            page,
            per_page,
        } => search(&dir, seed.as_deref(), &entity_type, &query, page, per_page),
        Command::Reindex {
            dir,
            seed,
            entity_type,
        } => reindex(&dir, seed.as_deref(), entity_type.as_deref()),
    }
}

fn init(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(CONFIG_FILE_NAME);
    if NodwatchConfig::write_default_if_missing(&path)? {
        println!("wrote {}", path.display());
    } else {
        println!("{} already exists", path.display());
    }
    Ok(())
}

fn check(dir: &Path) -> Result<()> {
    let path = dir.join(CONFIG_FILE_NAME);
    let config = NodwatchConfig::from_file(&path)?;
    println!(
        "{}: ok (search {}, sync_mode {}, per_page {}, workers {})",
        path.display(),
        if config.search.enabled { "enabled" } else { "disabled" },
        config.sync_mode()?,
        config.search.per_page,
        config.jobs.workers,
    );
    Ok(())
}

fn open(dir: &Path, seed: Option<&Path>) -> Result<Nodwatch> {
    let app = Nodwatch::open(dir).with_context(|| format!("cannot open {}", dir.display()))?;
    if let Some(path) = seed {
        let records = seed::read(path)?;
        let count = seed::load(app.db(), records)?;
        debug!(count, "seeded");
    }
    Ok(app)
}

fn search(
    dir: &Path,
    seed: Option<&Path>,
    entity_type: &str,
    query: &str,
    page: usize,
    per_page: Option<usize>,
) -> Result<()> {
    let app = open(dir, seed)?;
    let db = app.db();
    if !db.registry().is_searchable(entity_type) {
        bail!(
            "{} is not searchable; searchable types: {}",
            entity_type,
            db.registry().entity_types().join(", ")
        );
    }
    db.flush_index();

    let page_size = per_page.unwrap_or_else(|| db.per_page());
    let (records, hits) = db.search_records(entity_type, query, page, page_size)?;
    info!(total = hits.total, returned = records.len(), "search done");

    let output = json!({
        "query": query,
        "entity_type": entity_type,
        "page": hits.page,
        "page_size": hits.page_size,
        "total": hits.total,
        "results": records.iter().map(render).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn reindex(dir: &Path, seed: Option<&Path>, entity_type: Option<&str>) -> Result<()> {
    let app = open(dir, seed)?;
    let reports = match entity_type {
        Some(t) => vec![app.db().reindex(t)?],
        None => app.reindex_all()?,
    };

    let output: Vec<_> = reports
        .iter()
        .map(|r| {
            json!({
                "entity_type": r.entity_type,
                "indexed": r.indexed,
                "failed": r.failures.iter().map(|(id, e)| json!({
                    "id": id,
                    "error": e.to_string(),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);

    if reports.iter().any(|r| !r.failures.is_empty()) {
        bail!("reindex incomplete");
    }
    Ok(())
}

fn render(record: &Record) -> serde_json::Value {
    json!({
        "id": record.id,
        "version": record.version,
        "modified_at": record.modified_at,
        "data": record.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_args() {
        let cli = Cli::try_parse_from([
            "nodwatch", "-v", "search", "--dir", "d", "--seed", "s.jsonl", "post", "clinic",
            "--page", "2",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Search {
                entity_type,
                query,
                page,
                per_page,
                ..
            } => {
                assert_eq!(entity_type, "post");
                assert_eq!(query, "clinic");
                assert_eq!(page, 2);
                assert_eq!(per_page, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_init_then_check() {
        let dir = TempDir::new().unwrap();
        init(dir.path()).unwrap();
        check(dir.path()).unwrap();
        // Second init leaves the file alone
        init(dir.path()).unwrap();
    }

    #[test]
    fn test_search_and_reindex_with_seed() {
        let dir = TempDir::new().unwrap();
        let seed = dir.path().join("seed.jsonl");
        std::fs::write(
            &seed,
            "{\"type\": \"post\", \"data\": {\"body\": \"clinic visit\", \"user_id\": 1}}\n",
        )
        .unwrap();

        search(dir.path(), Some(&seed), "post", "clinic", 1, Some(10)).unwrap();
        reindex(dir.path(), Some(&seed), Some("post")).unwrap();
        assert!(search(dir.path(), None, "notification", "x", 1, None).is_err());
    }
}
