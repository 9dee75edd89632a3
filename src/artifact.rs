use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{ChairsError, Result};
use crate::merge::CanonicalCollection;
use crate::record::{Record, SourceDataset};
use crate::report::Stats;
use crate::views::{self, JurisdictionSummary};

/// The published document. Contains no timestamps, so identical input gives
/// byte-identical output.
#[derive(Debug, Serialize)]
pub struct Artifact<'a> {
    pub records: Vec<&'a Record>,
    pub jurisdictions: Vec<JurisdictionSummary>,
    pub stats: &'a Stats,
}

impl<'a> Artifact<'a> {
    pub fn new(collection: &'a CanonicalCollection, stats: &'a Stats) -> Self {
        Artifact {
            records: collection.records(),
            jurisdictions: views::jurisdictions(collection),
            stats,
        }
    }
}

/// Older artifacts are a bare array of records.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredArtifact {
    Document { records: Vec<Record> },
    Bare(Vec<Record>),
}

/// Load the prior canonical collection. A missing file is an empty
/// collection; ids are re-derived so older id schemes line up.
pub fn load_collection(path: &Path) -> Result<CanonicalCollection> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no prior artifact, starting empty");
            return Ok(CanonicalCollection::new());
        }
        Err(source) => {
            return Err(ChairsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let stored: StoredArtifact = serde_json::from_str(&text).map_err(|source| ChairsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let records = match stored {
        StoredArtifact::Document { records } | StoredArtifact::Bare(records) => records,
    };

    let loaded = records.len();
    let rekeyed = records.into_iter().filter_map(|r| match r.rekeyed() {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(error = %e, "dropping unkeyable record from prior artifact");
            None
        }
    });
    let collection = CanonicalCollection::from_records(rekeyed);
    info!(
        path = %path.display(),
        loaded,
        distinct = collection.len(),
        "prior artifact loaded"
    );
    Ok(collection)
}

pub fn save_artifact(path: &Path, artifact: &Artifact) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(artifact)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)?;
    info!(path = %path.display(), records = artifact.records.len(), "artifact written");
    Ok(())
}

pub fn load_dataset(path: &Path) -> Result<SourceDataset> {
    let text = fs::read_to_string(path).map_err(|source| ChairsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ChairsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_dataset(path: &Path, dataset: &SourceDataset) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(dataset)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Write to a uniquely named temp file in the same directory, fsync, then
/// rename over `path`. On failure the previous file is left as it was and the
/// temp file is removed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| ChairsError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(write_err)?;
            dir
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
