use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::record::{Record, SourceDataset};

/// The deduplicated record set, one entry per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalCollection {
    by_id: HashMap<String, Record>,
}

impl CanonicalCollection {
    pub fn new() -> Self {
        CanonicalCollection::default()
    }

    /// Build from loose records; a later record with the same id wins.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut collection = CanonicalCollection::new();
        for record in records {
            collection.upsert(record);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id)
    }

    /// Records ordered by jurisdiction code, subdivision name (case-insensitive), then id.
    pub fn records(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.by_id.values().collect();
        records.sort_by_cached_key(|r| sort_key(r));
        records
    }

    fn upsert(&mut self, record: Record) -> Outcome {
        match self.by_id.get_mut(&record.id) {
            Some(slot) if *slot == record => Outcome::Unchanged,
            Some(slot) => {
                *slot = record;
                Outcome::Replaced
            }
            None => {
                self.by_id.insert(record.id.clone(), record);
                Outcome::Inserted
            }
        }
    }
}

fn sort_key(r: &Record) -> (String, String, String) {
    (
        r.jurisdiction_code.clone(),
        r.subdivision_name.to_lowercase(),
        r.id.clone(),
    )
}

enum Outcome {
    Inserted,
    Replaced,
    Unchanged,
}

/// Counts of what a merge did to the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl MergeSummary {
    pub fn touched(&self) -> usize {
        self.inserted + self.replaced + self.unchanged
    }
}

/// Apply `datasets` in order on top of `existing`. Each record replaces its
/// slot wholesale, so later datasets win over earlier ones and over the prior
/// collection. Nothing is ever removed.
pub fn merge(
    existing: CanonicalCollection,
    datasets: &[SourceDataset],
) -> (CanonicalCollection, MergeSummary) {
    let mut collection = existing;
    let mut summary = MergeSummary::default();

    for dataset in datasets {
        let before = summary;
        for record in &dataset.records {
            match collection.upsert(record.clone()) {
                Outcome::Inserted => summary.inserted += 1,
                Outcome::Replaced => summary.replaced += 1,
                Outcome::Unchanged => summary.unchanged += 1,
            }
        }
        debug!(
            source = %dataset.provenance.source,
            inserted = summary.inserted - before.inserted,
            replaced = summary.replaced - before.replaced,
            unchanged = summary.unchanged - before.unchanged,
            "dataset merged"
        );
    }

    (collection, summary)
}
