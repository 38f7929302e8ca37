//! JSON-lines seed files
//!
//! One object per line: `{"type": "post", "id": 3, "data": {...}}`. The id
//! is optional; records without one get the next free integer id. Blank
//! lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use nodwatch::{Database, EntityId};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedRecord {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub id: Option<EntityId>,
    pub data: serde_json::Value,
}

pub fn parse(content: &str) -> Result<Vec<SeedRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("seed line {}", n + 1))
        })
        .collect()
}

pub fn read(path: &Path) -> Result<Vec<SeedRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read seed file {}", path.display()))?;
    parse(&content).with_context(|| format!("in {}", path.display()))
}

/// Insert every record in one transaction
pub fn load(db: &Database, records: Vec<SeedRecord>) -> Result<usize> {
    let count = records.len();
    let outcome = db
        .transaction_with_outcome(|txn| {
            for record in records {
                match record.id {
                    Some(id) => txn.insert_with_id(&record.entity_type, id, record.data)?,
                    None => {
                        txn.insert(&record.entity_type, record.data)?;
                    }
                }
            }
            Ok(())
        })
        .context("seed transaction failed")?
        .1;

    for failure in &outcome.index_failures {
        tracing::warn!("{}", failure);
    }
    info!(count, commit_version = outcome.commit_version, "seed loaded");
    Ok(count)
}
