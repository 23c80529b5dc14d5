//! `scan` command: parallel search across archives
//!
//! Every archive is opened on its own rayon worker; files that fail to
//! decode are logged and skipped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use g3::{open_archive_safe, ClassRegistry, Guid};
use rayon::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::file_utils::collect_files_with_extension;

/// What to look for
#[derive(Debug, Clone)]
pub enum Query {
    Guid(Guid),
    /// Lower-cased name fragment
    Name(String),
}

impl Query {
    pub fn from_args(guid: Option<&str>, name: Option<&str>) -> Result<Self> {
        match (guid, name) {
            (Some(text), _) => Ok(Query::Guid(
                Guid::parse(text).with_context(|| format!("Cannot parse GUID '{}'", text))?,
            )),
            (None, Some(name)) => Ok(Query::Name(name.to_lowercase())),
            (None, None) => anyhow::bail!("either --guid or --name is required"),
        }
    }

    fn matches(&self, guid: Guid, name: &str) -> bool {
        match self {
            Query::Guid(g) => *g == guid,
            Query::Name(fragment) => name.to_lowercase().contains(fragment),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub file: PathBuf,
    pub guid: Guid,
    pub name: String,
}

pub fn handle(dir: Option<PathBuf>, query: &Query, config: &Config) -> Result<()> {
    let dir = dir
        .or_else(|| config.data_dir.clone())
        .context("No directory given and no data directory configured (see `g3 configure`)")?;

    let hits = search(&dir, &config.archive_extensions, query)?;
    for hit in &hits {
        println!("{}  {}  {}", hit.guid, hit.name, hit.file.display());
    }
    println!("{} matches", hits.len());
    Ok(())
}

pub fn search(dir: &Path, extensions: &[String], query: &Query) -> Result<Vec<Hit>> {
    let files = collect_files_with_extension(dir, extensions)?;
    let registry = ClassRegistry::with_builtins();
    let skipped = AtomicUsize::new(0);

    let mut hits: Vec<Hit> = files
        .par_iter()
        .flat_map_iter(|file| {
            let found: Vec<Hit> = match open_archive_safe(file, &registry) {
                Some(archive) => archive
                    .graph()
                    .iter_flat()
                    .filter_map(|id| archive.graph().get(id))
                    .filter(|e| query.matches(e.guid(), &e.name))
                    .map(|e| Hit {
                        file: file.clone(),
                        guid: e.guid(),
                        name: e.name.clone(),
                    })
                    .collect(),
                None => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    Vec::new()
                }
            };
            found
        })
        .collect();

    hits.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.name.cmp(&b.name)));
    info!(
        files = files.len(),
        skipped = skipped.load(Ordering::Relaxed),
        hits = hits.len(),
        "Scan finished"
    );
    Ok(hits)
}
